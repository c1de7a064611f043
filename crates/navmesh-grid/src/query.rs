//! Queries over a set of grid tiles
//!
//! Nodes of neighbouring cells are connected when their heights differ by no
//! more than the walkable climb; diagonal moves additionally need both
//! orthogonal cells to be passable so corners are never cut.

use crate::filter::QueryFilter;
use crate::tile::{GridNode, GridTile};
use glam::{IVec2, Vec2, Vec3};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// Heuristic scale, slightly below one so the search stays admissible
const H_SCALE: f32 = 0.999;

const NEIGHBOURS: [IVec2; 8] = [
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(0, -1),
    IVec2::new(1, 1),
    IVec2::new(-1, 1),
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
];

/// Anything able to hand out tiles by tile position
pub trait TileSource {
    fn tile(&self, position: IVec2) -> Option<&GridTile>;

    /// Positions of every tile present, in no particular order
    fn tile_positions(&self) -> Box<dyn Iterator<Item = IVec2> + '_>;

    fn tile_count(&self) -> usize;
}

impl TileSource for HashMap<IVec2, GridTile> {
    fn tile(&self, position: IVec2) -> Option<&GridTile> {
        self.get(&position)
    }

    fn tile_positions(&self) -> Box<dyn Iterator<Item = IVec2> + '_> {
        Box::new(self.keys().copied())
    }

    fn tile_count(&self) -> usize {
        self.len()
    }
}

/// Reference to one node: global cell coordinates and layer within the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub cell: IVec2,
    pub layer: u16,
}

/// Parameters shared by every tile of one navmesh
#[derive(Debug, Clone, Copy)]
pub struct QueryParams {
    pub cell_size: f32,
    pub tile_cells: i32,
    /// Maximum height difference between connected nodes, in world units
    pub walkable_climb: f32,
    /// Search node budget
    pub max_nodes: usize,
}

/// Node corridor found by [`GridQuery::find_path`]
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// The corridor ends at the requested end node
    Complete(Vec<NodeRef>),
    /// The end node was not reached; the corridor ends at the closest node found
    Partial(Vec<NodeRef>),
}

impl PathResult {
    pub fn nodes(&self) -> &[NodeRef] {
        match self {
            PathResult::Complete(nodes) | PathResult::Partial(nodes) => nodes,
        }
    }
}

/// Result of walking a straight segment across the grid
#[derive(Debug, Clone, Copy)]
pub struct Walk {
    /// Last node reached
    pub last: NodeRef,
    /// Fraction of the segment covered before the walk was blocked; 1.0 when unobstructed
    pub t: f32,
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy)]
struct SearchNode {
    node: NodeRef,
    pos: Vec3,
    parent: Option<usize>,
    g: f32,
    h: f32,
    closed: bool,
}

/// Node wrapper for the binary heap (priority queue)
#[derive(Debug, Clone, Copy)]
struct HeapNode {
    index: usize,
    f: f32,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for a min-heap, ties broken by insertion order
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Read-only query object over a [`TileSource`]
pub struct GridQuery<'a, S: TileSource + ?Sized> {
    source: &'a S,
    params: QueryParams,
}

impl<'a, S: TileSource + ?Sized> GridQuery<'a, S> {
    pub fn new(source: &'a S, params: QueryParams) -> Self {
        Self { source, params }
    }

    /// Global cell containing a world position
    pub fn cell_of(&self, position: Vec3) -> IVec2 {
        (position.truncate() / self.params.cell_size)
            .floor()
            .as_ivec2()
    }

    fn nodes_in_cell(&self, cell: IVec2) -> &'a [GridNode] {
        let tile_cells = self.params.tile_cells;
        let tile_position = IVec2::new(cell.x.div_euclid(tile_cells), cell.y.div_euclid(tile_cells));
        let local = IVec2::new(cell.x.rem_euclid(tile_cells), cell.y.rem_euclid(tile_cells));
        match self.source.tile(tile_position) {
            Some(tile) => tile.nodes_at(local),
            None => &[],
        }
    }

    /// Node data of a reference, if it is still present
    pub fn node(&self, node: NodeRef) -> Option<GridNode> {
        self.nodes_in_cell(node.cell).get(node.layer as usize).copied()
    }

    /// Centre of the node's cell at the node's height
    pub fn node_position(&self, node: NodeRef) -> Option<Vec3> {
        let data = self.node(node)?;
        let center = (node.cell.as_vec2() + 0.5) * self.params.cell_size;
        Some(center.extend(data.height))
    }

    /// Node of `cell` reachable from `height`, closest in height
    fn step(&self, height: f32, cell: IVec2, filter: &QueryFilter) -> Option<NodeRef> {
        let climb = self.params.walkable_climb + 1e-3;
        self.nodes_in_cell(cell)
            .iter()
            .enumerate()
            .filter(|(_, n)| (n.height - height).abs() <= climb && filter.pass_filter(n.flags))
            .min_by(|(_, a), (_, b)| (a.height - height).abs().total_cmp(&(b.height - height).abs()))
            .map(|(layer, _)| NodeRef {
                cell,
                layer: layer as u16,
            })
    }

    /// Neighbour of `from` in direction `offset`, honouring the corner rule
    fn neighbour(&self, from: NodeRef, height: f32, offset: IVec2, filter: &QueryFilter) -> Option<NodeRef> {
        if offset.x != 0 && offset.y != 0 {
            self.step(height, from.cell + IVec2::new(offset.x, 0), filter)?;
            self.step(height, from.cell + IVec2::new(0, offset.y), filter)?;
        }
        self.step(height, from.cell + offset, filter)
    }

    /// Finds the node closest to `center` inside the search box.
    ///
    /// Returns the node and the closest point on its cell.
    pub fn find_nearest_node(
        &self,
        center: Vec3,
        half_extents: Vec3,
        filter: &QueryFilter,
    ) -> Option<(NodeRef, Vec3)> {
        let min = self.cell_of(center - half_extents);
        let max = self.cell_of(center + half_extents);
        let cs = self.params.cell_size;
        let tile_cells = self.params.tile_cells;
        let tile_of = |cell: IVec2| IVec2::new(cell.x.div_euclid(tile_cells), cell.y.div_euclid(tile_cells));
        let (tile_min, tile_max) = (tile_of(min), tile_of(max));

        // Visit only tiles that exist; a box wider than the mesh walks the loaded tiles instead
        let box_tiles = (tile_max.x as i64 - tile_min.x as i64 + 1) * (tile_max.y as i64 - tile_min.y as i64 + 1);
        let tiles: Vec<IVec2> = if box_tiles > self.source.tile_count() as i64 {
            self.source
                .tile_positions()
                .filter(|t| t.cmpge(tile_min).all() && t.cmple(tile_max).all())
                .collect()
        } else {
            (tile_min.y..=tile_max.y)
                .flat_map(|y| (tile_min.x..=tile_max.x).map(move |x| IVec2::new(x, y)))
                .collect()
        };

        let mut best: Option<(NodeRef, Vec3, f32)> = None;
        for tile_position in tiles {
            let Some(tile) = self.source.tile(tile_position) else {
                continue;
            };
            let origin = tile_position * tile_cells;
            let lo = min.max(origin);
            let hi = max.min(origin + IVec2::splat(tile_cells - 1));
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let cell = IVec2::new(x, y);
                    let cell_min = cell.as_vec2() * cs;
                    let closest_xy = center.truncate().clamp(cell_min, cell_min + Vec2::splat(cs));
                    for (layer, node) in tile.nodes_at(cell - origin).iter().enumerate() {
                        if (node.height - center.z).abs() > half_extents.z || !filter.pass_filter(node.flags) {
                            continue;
                        }
                        let closest = closest_xy.extend(node.height);
                        let distance = closest.distance_squared(center);
                        let node = NodeRef {
                            cell,
                            layer: layer as u16,
                        };
                        // Ties go to the lowest row, column and layer whatever the tile order
                        let better = best.map_or(true, |(b, _, d)| {
                            distance
                                .total_cmp(&d)
                                .then((cell.y, cell.x, node.layer).cmp(&(b.cell.y, b.cell.x, b.layer)))
                                == Ordering::Less
                        });
                        if better {
                            best = Some((node, closest, distance));
                        }
                    }
                }
            }
        }

        best.map(|(node, closest, _)| (node, closest))
    }

    /// A* search from `start` towards `end`.
    ///
    /// Returns `None` when the start node is missing or rejected by the filter.
    pub fn find_path(
        &self,
        start: NodeRef,
        end: NodeRef,
        end_pos: Vec3,
        filter: &QueryFilter,
    ) -> Option<PathResult> {
        let start_node = self.node(start).filter(|n| filter.pass_filter(n.flags))?;
        let start_pos = self.node_position(start)?;
        let goal_pos = self.node_position(end).unwrap_or(end_pos);

        if start == end {
            return Some(PathResult::Complete(vec![start]));
        }

        let mut pool = Vec::with_capacity(256);
        let mut lookup: HashMap<NodeRef, usize> = HashMap::new();
        let mut open = BinaryHeap::new();

        let start_h = start_pos.distance(goal_pos) * H_SCALE;
        pool.push(SearchNode {
            node: start,
            pos: start_pos,
            parent: None,
            g: 0.0,
            h: start_h,
            closed: false,
        });
        lookup.insert(start, 0);
        open.push(HeapNode { index: 0, f: start_h });

        let mut best = 0;
        let mut found = false;

        while let Some(HeapNode { index, f }) = open.pop() {
            let current = pool[index];
            if current.closed || f > current.g + current.h {
                continue;
            }
            pool[index].closed = true;

            if current.node == end {
                best = index;
                found = true;
                break;
            }
            if current.h < pool[best].h {
                best = index;
            }

            let Some(current_data) = self.node(current.node) else {
                continue;
            };
            let current_cost = filter.cost(current_data.area);

            for offset in NEIGHBOURS {
                let Some(next) = self.neighbour(current.node, current_data.height, offset, filter) else {
                    continue;
                };
                let (Some(next_data), Some(next_pos)) = (self.node(next), self.node_position(next)) else {
                    continue;
                };
                let cost = current.pos.distance(next_pos)
                    * 0.5
                    * (current_cost + filter.cost(next_data.area));
                let g = current.g + cost;

                match lookup.get(&next).copied() {
                    Some(existing) => {
                        let node = &mut pool[existing];
                        if node.closed || g >= node.g {
                            continue;
                        }
                        node.g = g;
                        node.parent = Some(index);
                        open.push(HeapNode {
                            index: existing,
                            f: g + node.h,
                        });
                    }
                    None => {
                        if pool.len() >= self.params.max_nodes {
                            continue;
                        }
                        let h = next_pos.distance(goal_pos) * H_SCALE;
                        let new_index = pool.len();
                        pool.push(SearchNode {
                            node: next,
                            pos: next_pos,
                            parent: Some(index),
                            g,
                            h,
                            closed: false,
                        });
                        lookup.insert(next, new_index);
                        open.push(HeapNode { index: new_index, f: g + h });
                    }
                }
            }
        }

        let mut path = Vec::new();
        let mut cursor = Some(best);
        while let Some(index) = cursor {
            path.push(pool[index].node);
            cursor = pool[index].parent;
        }
        path.reverse();

        log::trace!(
            "find_path visited {} nodes (start area {}), found: {}",
            pool.len(),
            start_node.area,
            found
        );

        if found {
            Some(PathResult::Complete(path))
        } else {
            Some(PathResult::Partial(path))
        }
    }

    /// Walks the straight segment `from -> to` starting on node `start`.
    ///
    /// Nodes whose area costs more than `cost_limit` block the walk.
    pub fn walk(
        &self,
        start: NodeRef,
        from: Vec3,
        to: Vec3,
        filter: &QueryFilter,
        cost_limit: f32,
    ) -> Walk {
        let cs = self.params.cell_size;
        let target = self.cell_of(to);
        let dir = (to - from).truncate();

        let step = IVec2::new(dir.x.signum() as i32, dir.y.signum() as i32);
        let boundary = |cell: i32, s: i32| (cell + i32::from(s > 0)) as f32 * cs;
        let mut t_max = Vec2::new(
            if dir.x != 0.0 { (boundary(start.cell.x, step.x) - from.x) / dir.x } else { f32::INFINITY },
            if dir.y != 0.0 { (boundary(start.cell.y, step.y) - from.y) / dir.y } else { f32::INFINITY },
        );
        let t_delta = Vec2::new(
            if dir.x != 0.0 { cs / dir.x.abs() } else { f32::INFINITY },
            if dir.y != 0.0 { cs / dir.y.abs() } else { f32::INFINITY },
        );

        let mut current = start;
        let mut height = self.node(start).map_or(from.z, |n| n.height);
        let max_steps = (start.cell - target).abs().element_sum() + 2;

        for _ in 0..max_steps {
            if current.cell == target {
                break;
            }
            let (next_cell, t) = if t_max.x < t_max.y {
                let t = t_max.x;
                t_max.x += t_delta.x;
                (current.cell + IVec2::new(step.x, 0), t)
            } else {
                let t = t_max.y;
                t_max.y += t_delta.y;
                (current.cell + IVec2::new(0, step.y), t)
            };

            let next = self
                .step(height, next_cell, filter)
                .filter(|n| self.node(*n).is_some_and(|d| filter.cost(d.area) <= cost_limit));
            match next {
                Some(next) => {
                    current = next;
                    height = self.node(next).map_or(height, |n| n.height);
                }
                None => {
                    return Walk {
                        last: current,
                        t: t.clamp(0.0, 1.0),
                        blocked: true,
                    }
                }
            }
        }

        Walk {
            last: current,
            t: 1.0,
            blocked: current.cell != target,
        }
    }

    /// Reduces a node corridor to the corner points of a straight path.
    ///
    /// The first point is `start_pos`, the last one `end_pos`; both are expected to
    /// lie on the first and last corridor node.
    pub fn find_straight_path(
        &self,
        start_pos: Vec3,
        end_pos: Vec3,
        path: &[NodeRef],
        filter: &QueryFilter,
    ) -> Vec<Vec3> {
        let mut points = vec![start_pos];
        if path.is_empty() {
            return points;
        }

        let point_of = |i: usize| -> Vec3 {
            if i + 1 == path.len() {
                end_pos
            } else {
                self.node_position(path[i]).unwrap_or(end_pos)
            }
        };
        let cost_of = |node: NodeRef| self.node(node).map_or(f32::INFINITY, |n| filter.cost(n.area));
        // Points on a cell edge belong to either cell; walks aim inside the corridor node
        let cs = self.params.cell_size;
        let inset = cs * 1e-3;
        let walk_target = |i: usize| -> Vec3 {
            let point = point_of(i);
            let min = path[i].cell.as_vec2() * cs;
            point
                .truncate()
                .clamp(min + Vec2::splat(inset), min + Vec2::splat(cs - inset))
                .extend(point.z)
        };

        let mut anchor = 0;
        let mut anchor_pos = start_pos;
        while anchor + 1 < path.len() {
            let mut next = anchor + 1;
            for candidate in anchor + 2..path.len() {
                let limit = cost_of(path[anchor]).max(cost_of(path[candidate]));
                let walk = self.walk(path[anchor], anchor_pos, walk_target(candidate), filter, limit);
                if walk.blocked || walk.last != path[candidate] {
                    break;
                }
                next = candidate;
            }
            anchor = next;
            anchor_pos = point_of(anchor);
            points.push(anchor_pos);
        }

        if path.len() == 1 && end_pos != start_pos {
            points.push(end_pos);
        }
        points
    }

    /// Picks a random node within `radius` of `center`, reachable from `start`,
    /// and a random point on it inside the circle.
    pub fn find_random_point_around_circle(
        &self,
        start: NodeRef,
        center: Vec3,
        radius: f32,
        filter: &QueryFilter,
        rng: &mut fastrand::Rng,
    ) -> Option<(NodeRef, Vec3)> {
        self.node(start).filter(|n| filter.pass_filter(n.flags))?;

        let cs = self.params.cell_size;
        let reach = radius + cs;
        let within = |node: NodeRef, limit: f32| {
            let c = (node.cell.as_vec2() + 0.5) * cs;
            c.distance(center.truncate()) <= limit
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut chosen = None;
        let mut candidates = 0usize;

        while let Some(current) = queue.pop_front() {
            if within(current, radius) {
                candidates += 1;
                if rng.usize(0..candidates) == 0 {
                    chosen = Some(current);
                }
            }
            let Some(height) = self.node(current).map(|n| n.height) else {
                continue;
            };
            for offset in NEIGHBOURS {
                if visited.len() >= self.params.max_nodes {
                    break;
                }
                if let Some(next) = self.neighbour(current, height, offset, filter) {
                    if within(next, reach) && visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        let node = chosen?;
        let data = self.node(node)?;
        let cell_min = node.cell.as_vec2() * cs;
        let mut point = cell_min + Vec2::new(rng.f32(), rng.f32()) * cs;
        if point.distance(center.truncate()) > radius {
            point = cell_min + Vec2::splat(cs * 0.5);
        }
        Some((node, point.extend(data.height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::filter::{NodeFlags, MAX_AREAS};
    use crate::tile::{build_tile, TileInput};

    const GROUND: u8 = 63;
    const MUD: u8 = 5;

    fn config() -> GridConfig {
        let mut area_flags = vec![NodeFlags::WALK; MAX_AREAS];
        area_flags[0] = NodeFlags::empty();
        GridConfig {
            cell_size: 1.0,
            cell_height: 0.1,
            tile_cells: 8,
            border_cells: 2,
            walkable_slope_angle: 45.0,
            walkable_height: 10,
            walkable_climb: 3,
            walkable_radius: 0,
            swim_depth: 10,
            water_area: 1,
            area_flags,
        }
    }

    fn params() -> QueryParams {
        QueryParams {
            cell_size: 1.0,
            tile_cells: 8,
            walkable_climb: 0.3,
            max_nodes: 4096,
        }
    }

    struct Scene {
        vertices: Vec<f32>,
        indices: Vec<u32>,
        areas: Vec<u8>,
    }

    impl Scene {
        fn new() -> Self {
            Self {
                vertices: Vec::new(),
                indices: Vec::new(),
                areas: Vec::new(),
            }
        }

        fn quad(mut self, min: Vec2, max: Vec2, z: f32, area: u8) -> Self {
            let base = (self.vertices.len() / 3) as u32;
            self.vertices
                .extend_from_slice(&[min.x, min.y, z, max.x, min.y, z, max.x, max.y, z, min.x, max.y, z]);
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            self.areas.extend_from_slice(&[area, area]);
            self
        }

        fn build(&self, tiles: &[IVec2]) -> HashMap<IVec2, GridTile> {
            let config = config();
            tiles
                .iter()
                .filter_map(|&position| {
                    let input = TileInput {
                        position,
                        vertices: &self.vertices,
                        indices: &self.indices,
                        areas: &self.areas,
                        water: &[],
                    };
                    build_tile(&config, &input).unwrap().map(|tile| (position, tile))
                })
                .collect()
        }
    }

    fn node_at(query: &GridQuery<HashMap<IVec2, GridTile>>, p: Vec3) -> NodeRef {
        query
            .find_nearest_node(p, Vec3::new(0.5, 0.5, 1.0), &QueryFilter::default())
            .unwrap()
            .0
    }

    #[test]
    fn test_find_nearest_node() {
        let tiles = Scene::new()
            .quad(Vec2::splat(0.0), Vec2::splat(8.0), 0.0, GROUND)
            .build(&[IVec2::ZERO]);
        let query = GridQuery::new(&tiles, params());
        let (node, point) = query
            .find_nearest_node(Vec3::new(2.5, 3.5, 0.5), Vec3::splat(1.0), &QueryFilter::default())
            .unwrap();
        assert_eq!(node.cell, IVec2::new(2, 3));
        assert!((point.x - 2.5).abs() < 1e-5);
        assert!((point.y - 3.5).abs() < 1e-5);

        let none = query.find_nearest_node(Vec3::new(2.5, 3.5, 5.0), Vec3::splat(1.0), &QueryFilter::default());
        assert!(none.is_none());

        let swim_only = QueryFilter::new(NodeFlags::SWIM);
        assert!(query
            .find_nearest_node(Vec3::new(2.5, 3.5, 0.5), Vec3::splat(1.0), &swim_only)
            .is_none());
    }

    #[test]
    fn test_find_nearest_node_with_huge_extents() {
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(16.0, 8.0), 0.0, GROUND)
            .build(&[IVec2::new(0, 0), IVec2::new(1, 0)]);
        let query = GridQuery::new(&tiles, params());
        let filter = QueryFilter::default();

        let far = query.find_nearest_node(Vec3::new(1e6, 1e6, 0.0), Vec3::new(1e5, 1e5, 1.0), &filter);
        assert!(far.is_none());

        let (node, point) = query
            .find_nearest_node(Vec3::new(12.5, 4.5, 0.2), Vec3::new(1e7, 1e7, 1.0), &filter)
            .unwrap();
        assert_eq!(node.cell, IVec2::new(12, 4));
        assert!((point.x - 12.5).abs() < 1e-5);
        assert!((point.y - 4.5).abs() < 1e-5);
    }

    #[test]
    fn test_find_path_across_tiles() {
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(16.0, 8.0), 0.0, GROUND)
            .build(&[IVec2::new(0, 0), IVec2::new(1, 0)]);
        let query = GridQuery::new(&tiles, params());
        let start = node_at(&query, Vec3::new(1.5, 4.5, 0.2));
        let end = node_at(&query, Vec3::new(14.5, 4.5, 0.2));
        let result = query
            .find_path(start, end, Vec3::new(14.5, 4.5, 0.2), &QueryFilter::default())
            .unwrap();
        let PathResult::Complete(path) = result else {
            panic!("expected a complete path");
        };
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));

        let straight = query.find_straight_path(
            Vec3::new(1.5, 4.5, 0.2),
            Vec3::new(14.5, 4.5, 0.2),
            &path,
            &QueryFilter::default(),
        );
        assert_eq!(straight.len(), 2);
    }

    #[test]
    fn test_straight_path_to_cell_edge_has_no_extra_corner() {
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(16.0, 8.0), 0.0, GROUND)
            .build(&[IVec2::new(0, 0), IVec2::new(1, 0)]);
        let query = GridQuery::new(&tiles, params());
        let filter = QueryFilter::default();
        // Both ends lie on cell edges; the nearest nodes sit on the near side
        let (start, start_pos) = query
            .find_nearest_node(Vec3::new(2.0, 4.25, 0.2), Vec3::new(0.5, 0.5, 1.0), &filter)
            .unwrap();
        let (end, end_pos) = query
            .find_nearest_node(Vec3::new(12.0, 4.25, 0.2), Vec3::new(0.5, 0.5, 1.0), &filter)
            .unwrap();
        assert_eq!(end.cell.x, 11);
        let path = query.find_path(start, end, end_pos, &filter).unwrap();
        let straight = query.find_straight_path(start_pos, end_pos, path.nodes(), &filter);
        assert_eq!(straight.len(), 2);
        assert_eq!(straight[1], end_pos);
    }

    #[test]
    fn test_unreachable_end_gives_partial_path() {
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(2.9, 8.0), 0.0, GROUND)
            .quad(Vec2::new(5.1, 0.0), Vec2::new(8.0, 8.0), 0.0, GROUND)
            .build(&[IVec2::ZERO]);
        let query = GridQuery::new(&tiles, params());
        let start = node_at(&query, Vec3::new(0.5, 4.5, 0.2));
        let end = node_at(&query, Vec3::new(7.5, 4.5, 0.2));
        let result = query
            .find_path(start, end, Vec3::new(7.5, 4.5, 0.2), &QueryFilter::default())
            .unwrap();
        let PathResult::Partial(path) = result else {
            panic!("expected a partial path");
        };
        assert_eq!(path.last().map(|n| n.cell.x), Some(2));
    }

    #[test]
    fn test_expensive_area_is_avoided() {
        // Mud strip in the middle with a ground detour along the top edge
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(3.0, 8.0), 0.0, GROUND)
            .quad(Vec2::new(3.0, 0.0), Vec2::new(5.0, 7.0), 0.0, MUD)
            .quad(Vec2::new(3.0, 7.0), Vec2::new(5.0, 8.0), 0.0, GROUND)
            .quad(Vec2::new(5.0, 0.0), Vec2::new(8.0, 8.0), 0.0, GROUND)
            .build(&[IVec2::ZERO]);
        let query = GridQuery::new(&tiles, params());
        let start = node_at(&query, Vec3::new(0.5, 0.5, 0.2));
        let end = node_at(&query, Vec3::new(7.5, 0.5, 0.2));

        let cheap = QueryFilter::default();
        let direct = query.find_path(start, end, Vec3::new(7.5, 0.5, 0.2), &cheap).unwrap();
        assert!(direct.nodes().iter().all(|n| n.cell.y <= 1));

        let expensive = QueryFilter::default().with_area_cost(MUD, 100.0);
        let detour = query.find_path(start, end, Vec3::new(7.5, 0.5, 0.2), &expensive).unwrap();
        assert!(matches!(detour, PathResult::Complete(_)));
        assert!(detour.nodes().iter().any(|n| n.cell.y == 7));
    }

    #[test]
    fn test_raycast_walk_stops_at_gap() {
        let tiles = Scene::new()
            .quad(Vec2::new(0.0, 0.0), Vec2::new(3.9, 8.0), 0.0, GROUND)
            .build(&[IVec2::ZERO]);
        let query = GridQuery::new(&tiles, params());
        let start = node_at(&query, Vec3::new(0.5, 4.5, 0.2));
        let walk = query.walk(
            start,
            Vec3::new(0.5, 4.5, 0.2),
            Vec3::new(7.5, 4.5, 0.2),
            &QueryFilter::default(),
            f32::INFINITY,
        );
        assert!(walk.blocked);
        assert_eq!(walk.last.cell, IVec2::new(3, 4));
        assert!((0.0..1.0).contains(&walk.t));

        let free = query.walk(
            start,
            Vec3::new(0.5, 4.5, 0.2),
            Vec3::new(3.5, 1.5, 0.2),
            &QueryFilter::default(),
            f32::INFINITY,
        );
        assert!(!free.blocked);
        assert_eq!(free.last.cell, IVec2::new(3, 1));
    }

    #[test]
    fn test_random_point_is_reproducible_and_inside_circle() {
        let tiles = Scene::new()
            .quad(Vec2::splat(0.0), Vec2::splat(8.0), 0.0, GROUND)
            .build(&[IVec2::ZERO]);
        let query = GridQuery::new(&tiles, params());
        let center = Vec3::new(4.0, 4.0, 0.2);
        let start = node_at(&query, center);

        let mut first_rng = fastrand::Rng::with_seed(42);
        let mut second_rng = fastrand::Rng::with_seed(42);
        let first = query
            .find_random_point_around_circle(start, center, 2.0, &QueryFilter::default(), &mut first_rng)
            .unwrap();
        let second = query
            .find_random_point_around_circle(start, center, 2.0, &QueryFilter::default(), &mut second_rng)
            .unwrap();
        assert_eq!(first, second);
        assert!(first.1.truncate().distance(center.truncate()) <= 2.0);
    }
}
