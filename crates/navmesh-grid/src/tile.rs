//! Grid tiles: walkable nodes extracted from a rasterized span grid

use crate::config::GridConfig;
use crate::filter::NodeFlags;
use crate::heightfield::SpanGrid;
use crate::rasterization::{clear_unwalkable_triangles, rasterize_triangles};
use crate::NULL_AREA;
use glam::{IVec2, Vec2};
use navigator_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A horizontal water surface covering a world rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterRect {
    pub min: Vec2,
    pub max: Vec2,
    pub level: f32,
}

impl WaterRect {
    #[inline]
    fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

/// Geometry of one tile, border included
#[derive(Debug, Clone, Copy)]
pub struct TileInput<'a> {
    pub position: IVec2,
    pub vertices: &'a [f32],
    pub indices: &'a [u32],
    pub areas: &'a [u8],
    pub water: &'a [WaterRect],
}

/// One walkable surface in a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    /// World height of the surface
    pub height: f32,
    pub area: u8,
    pub flags: NodeFlags,
}

/// Walkable nodes of one tile, stored column by column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTile {
    pub position: IVec2,
    /// Cells along one side
    pub size: i32,
    pub cell_size: f32,
    cell_start: Vec<u32>,
    nodes: Vec<GridNode>,
}

impl GridTile {
    /// Builds a tile from per-cell node lists, row-major along Y
    pub fn from_columns(position: IVec2, size: i32, cell_size: f32, columns: Vec<Vec<GridNode>>) -> Result<Self> {
        if size < 0 || columns.len() != (size as usize) * (size as usize) {
            return Err(Error::InvalidGeometry(format!(
                "{} columns do not fill a {size}x{size} tile",
                columns.len()
            )));
        }
        let mut cell_start = Vec::with_capacity(columns.len() + 1);
        let mut nodes = Vec::new();
        for column in columns {
            cell_start.push(nodes.len() as u32);
            nodes.extend(column);
        }
        cell_start.push(nodes.len() as u32);
        Ok(Self {
            position,
            size,
            cell_size,
            cell_start,
            nodes,
        })
    }

    /// Minimum corner of the tile in world XY
    pub fn origin(&self) -> Vec2 {
        (self.position * self.size).as_vec2() * self.cell_size
    }

    /// Nodes of one cell in tile-local coordinates, ordered bottom to top
    pub fn nodes_at(&self, local: IVec2) -> &[GridNode] {
        if local.x < 0 || local.y < 0 || local.x >= self.size || local.y >= self.size {
            return &[];
        }
        let cell = (local.y * self.size + local.x) as usize;
        let start = self.cell_start[cell] as usize;
        let end = self.cell_start[cell + 1] as usize;
        &self.nodes[start..end]
    }

    /// Total number of walkable nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Approximate heap footprint in bytes
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.cell_start.len() * std::mem::size_of::<u32>()
            + self.nodes.len() * std::mem::size_of::<GridNode>()
    }
}

#[derive(Debug, Clone, Copy)]
struct RawNode {
    top: i32,
    area: u8,
}

/// Layered nodes of the whole rasterized grid
struct Layers {
    size: i32,
    start: Vec<usize>,
    nodes: Vec<RawNode>,
}

impl Layers {
    #[inline]
    fn column(&self, x: i32, y: i32) -> std::ops::Range<usize> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return 0..0;
        }
        let cell = (y * self.size + x) as usize;
        self.start[cell]..self.start[cell + 1]
    }

    /// Node in the neighbouring column reachable within `climb`
    fn neighbour(&self, x: i32, y: i32, top: i32, climb: i32) -> Option<usize> {
        self.column(x, y)
            .filter(|&n| self.nodes[n].top.abs_diff(top) <= climb.max(0) as u32)
            .min_by_key(|&n| self.nodes[n].top.abs_diff(top))
    }
}

const ORTHOGONAL: [IVec2; 4] = [IVec2::new(1, 0), IVec2::new(0, 1), IVec2::new(-1, 0), IVec2::new(0, -1)];
const DIAGONAL: [IVec2; 4] = [IVec2::new(1, 1), IVec2::new(-1, 1), IVec2::new(-1, -1), IVec2::new(1, -1)];

/// Builds the grid tile for one tile position.
///
/// Returns `Ok(None)` when the tile has no walkable node.
pub fn build_tile(config: &GridConfig, input: &TileInput) -> Result<Option<GridTile>> {
    config.validate().map_err(Error::InvalidSettings)?;

    let size = config.grid_cells();
    let tile_origin = input.position.as_vec2() * config.tile_world_size();
    let origin = tile_origin - Vec2::splat(config.border_cells as f32 * config.cell_size);

    let mut areas = input.areas.to_vec();
    clear_unwalkable_triangles(
        config.walkable_slope_angle,
        input.vertices,
        input.indices,
        &mut areas,
    )?;

    let mut grid = SpanGrid::new(size, origin, config.cell_size, config.cell_height);
    rasterize_triangles(
        input.vertices,
        input.indices,
        &areas,
        &mut grid,
        config.walkable_climb,
    )?;

    let mut layers = collect_nodes(config, &grid, input.water);
    if config.walkable_radius > 0 {
        erode(config, &mut layers);
    }

    let tile = crop(config, input.position, &layers);
    log::trace!(
        "Built grid tile ({}, {}): {} spans, {} nodes",
        input.position.x,
        input.position.y,
        grid.span_count(),
        tile.node_count()
    );

    if tile.node_count() == 0 {
        return Ok(None);
    }
    Ok(Some(tile))
}

fn collect_nodes(config: &GridConfig, grid: &SpanGrid, water: &[WaterRect]) -> Layers {
    let size = grid.size;
    let inverse_ch = 1.0 / config.cell_height;
    let mut start = Vec::with_capacity((size * size) as usize + 1);
    let mut nodes = Vec::new();

    for y in 0..size {
        for x in 0..size {
            start.push(nodes.len());
            let center = grid.origin + (IVec2::new(x, y).as_vec2() + 0.5) * grid.cs;
            let swim_top = water
                .iter()
                .find(|w| w.contains(center))
                .map(|w| ((w.level * inverse_ch).floor() as i32).saturating_sub(config.swim_depth));

            let spans = grid.column(x, y);
            let column_start = nodes.len();
            for (i, span) in spans.iter().enumerate() {
                if span.area == NULL_AREA {
                    continue;
                }
                let headroom = spans
                    .get(i + 1)
                    .map_or(true, |s| s.min as i64 - span.max as i64 >= config.walkable_height as i64);
                if !headroom {
                    continue;
                }
                if swim_top.is_some_and(|top| span.max < top) {
                    continue;
                }
                nodes.push(RawNode {
                    top: span.max,
                    area: span.area,
                });
            }

            if let Some(top) = swim_top {
                let blocked = spans
                    .iter()
                    .any(|s| s.max >= top && s.min < top.saturating_add(config.walkable_height));
                if !blocked {
                    let at = nodes[column_start..].partition_point(|n| n.top < top);
                    nodes.insert(
                        column_start + at,
                        RawNode {
                            top,
                            area: config.water_area,
                        },
                    );
                }
            }
        }
    }
    start.push(nodes.len());

    Layers { size, start, nodes }
}

/// Removes nodes closer than the walkable radius to an unreachable edge
fn erode(config: &GridConfig, layers: &mut Layers) {
    let climb = config.walkable_climb;
    let mut dist = vec![u32::MAX; layers.nodes.len()];
    let mut heap = BinaryHeap::new();

    for y in 0..layers.size {
        for x in 0..layers.size {
            for n in layers.column(x, y) {
                let top = layers.nodes[n].top;
                let boundary = ORTHOGONAL
                    .iter()
                    .any(|d| layers.neighbour(x + d.x, y + d.y, top, climb).is_none());
                if boundary {
                    dist[n] = 0;
                    heap.push(Reverse((0u32, n, x, y)));
                }
            }
        }
    }

    while let Some(Reverse((d, n, x, y))) = heap.pop() {
        if d > dist[n] {
            continue;
        }
        let top = layers.nodes[n].top;
        let steps = ORTHOGONAL.iter().map(|o| (o, 2)).chain(DIAGONAL.iter().map(|o| (o, 3)));
        for (offset, weight) in steps {
            let (nx, ny) = (x + offset.x, y + offset.y);
            if let Some(m) = layers.neighbour(nx, ny, top, climb) {
                let nd = d + weight;
                if nd < dist[m] {
                    dist[m] = nd;
                    heap.push(Reverse((nd, m, nx, ny)));
                }
            }
        }
    }

    let threshold = (config.walkable_radius * 2) as u32;
    let mut start = Vec::with_capacity(layers.start.len());
    let mut nodes = Vec::with_capacity(layers.nodes.len());
    for cell in 0..layers.start.len() - 1 {
        start.push(nodes.len());
        for n in layers.start[cell]..layers.start[cell + 1] {
            if dist[n] >= threshold {
                nodes.push(layers.nodes[n]);
            }
        }
    }
    start.push(nodes.len());
    layers.start = start;
    layers.nodes = nodes;
}

fn crop(config: &GridConfig, position: IVec2, layers: &Layers) -> GridTile {
    let size = config.tile_cells;
    let border = config.border_cells;
    let mut cell_start = Vec::with_capacity((size * size) as usize + 1);
    let mut nodes = Vec::new();

    for y in 0..size {
        for x in 0..size {
            cell_start.push(nodes.len() as u32);
            for n in layers.column(x + border, y + border) {
                let raw = layers.nodes[n];
                nodes.push(GridNode {
                    height: raw.top as f32 * config.cell_height,
                    area: raw.area,
                    flags: config.flags_for_area(raw.area),
                });
            }
        }
    }
    cell_start.push(nodes.len() as u32);

    GridTile {
        position,
        size,
        cell_size: config.cell_size,
        cell_start,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::MAX_AREAS;

    const GROUND: u8 = 63;
    const WATER: u8 = 1;

    fn config() -> GridConfig {
        let mut area_flags = vec![NodeFlags::WALK; MAX_AREAS];
        area_flags[0] = NodeFlags::empty();
        area_flags[WATER as usize] = NodeFlags::SWIM;
        GridConfig {
            cell_size: 1.0,
            cell_height: 0.1,
            tile_cells: 8,
            border_cells: 2,
            walkable_slope_angle: 45.0,
            walkable_height: 10,
            walkable_climb: 3,
            walkable_radius: 1,
            swim_depth: 10,
            water_area: WATER,
            area_flags,
        }
    }

    /// A square plane from `min` to `max` at height `z`
    fn plane(min: f32, max: f32, z: f32) -> (Vec<f32>, Vec<u32>, Vec<u8>) {
        let vertices = vec![min, min, z, max, min, z, max, max, z, min, max, z];
        (vertices, vec![0, 1, 2, 0, 2, 3], vec![GROUND, GROUND])
    }

    fn input<'a>(
        vertices: &'a [f32],
        indices: &'a [u32],
        areas: &'a [u8],
        water: &'a [WaterRect],
    ) -> TileInput<'a> {
        TileInput {
            position: IVec2::ZERO,
            vertices,
            indices,
            areas,
            water,
        }
    }

    #[test]
    fn test_empty_input_builds_nothing() {
        let tile = build_tile(&config(), &input(&[], &[], &[], &[])).unwrap();
        assert!(tile.is_none());
    }

    #[test]
    fn test_plane_covering_border_fills_every_cell() {
        let (v, i, a) = plane(-10.0, 20.0, 1.0);
        let tile = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap().unwrap();
        assert_eq!(tile.node_count(), 64);
        let node = tile.nodes_at(IVec2::new(3, 4))[0];
        assert_eq!(node.area, GROUND);
        assert_eq!(node.flags, NodeFlags::WALK);
        assert!((node.height - 1.0).abs() < 0.15);
    }

    #[test]
    fn test_ground_below_zero_is_walkable() {
        let (v, i, a) = plane(-10.0, 20.0, -2.0);
        let tile = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap().unwrap();
        assert_eq!(tile.node_count(), 64);
        let node = tile.nodes_at(IVec2::new(4, 4))[0];
        assert_eq!(node.area, GROUND);
        assert!((node.height + 2.0).abs() < 0.15);
    }

    #[test]
    fn test_plane_edges_are_eroded() {
        let (v, i, a) = plane(2.1, 5.9, 0.0);
        let tile = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap().unwrap();
        assert!(tile.nodes_at(IVec2::new(2, 2)).is_empty());
        assert!(tile.nodes_at(IVec2::new(5, 5)).is_empty());
        assert_eq!(tile.nodes_at(IVec2::new(3, 3)).len(), 1);
        assert_eq!(tile.node_count(), 4);
    }

    #[test]
    fn test_low_ceiling_removes_floor() {
        let (mut v, mut i, mut a) = plane(-10.0, 20.0, 0.0);
        // ceiling plate half a walkable height above the floor over the whole grid
        v.extend_from_slice(&[-10.0, -10.0, 0.5, 20.0, -10.0, 0.5, 20.0, 20.0, 0.5, -10.0, 20.0, 0.5]);
        i.extend_from_slice(&[4, 5, 6, 4, 6, 7]);
        a.extend_from_slice(&[GROUND, GROUND]);
        let tile = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap().unwrap();
        for node in tile.nodes_at(IVec2::new(4, 4)) {
            assert!(node.height > 0.3);
        }
    }

    #[test]
    fn test_deep_water_becomes_swim_surface() {
        let (v, i, a) = plane(-10.0, 20.0, -5.0);
        let water = [WaterRect {
            min: Vec2::splat(-10.0),
            max: Vec2::splat(20.0),
            level: 0.0,
        }];
        let tile = build_tile(&config(), &input(&v, &i, &a, &water)).unwrap().unwrap();
        let nodes = tile.nodes_at(IVec2::new(4, 4));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].area, WATER);
        assert_eq!(nodes[0].flags, NodeFlags::SWIM);
        assert!((nodes[0].height + 1.0).abs() < 0.15);
    }

    #[test]
    fn test_shallow_water_keeps_ground() {
        let (v, i, a) = plane(-10.0, 20.0, -0.5);
        let water = [WaterRect {
            min: Vec2::splat(-10.0),
            max: Vec2::splat(20.0),
            level: 0.0,
        }];
        let tile = build_tile(&config(), &input(&v, &i, &a, &water)).unwrap().unwrap();
        let nodes = tile.nodes_at(IVec2::new(4, 4));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].area, GROUND);
    }

    #[test]
    fn test_from_columns() {
        let node = GridNode {
            height: 0.5,
            area: GROUND,
            flags: NodeFlags::WALK,
        };
        let tile = GridTile::from_columns(IVec2::new(1, 2), 2, 1.0, vec![vec![node], vec![], vec![node, node], vec![]])
            .unwrap();
        assert_eq!(tile.node_count(), 3);
        assert_eq!(tile.nodes_at(IVec2::new(0, 1)).len(), 2);
        assert!(tile.nodes_at(IVec2::new(1, 1)).is_empty());
        assert_eq!(tile.origin(), Vec2::new(2.0, 4.0));
        assert!(GridTile::from_columns(IVec2::ZERO, 2, 1.0, vec![vec![node]]).is_err());
    }

    #[test]
    fn test_identical_input_builds_identical_tile() {
        let (v, i, a) = plane(-10.0, 20.0, 1.0);
        let first = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap();
        let second = build_tile(&config(), &input(&v, &i, &a, &[])).unwrap();
        assert_eq!(first, second);
    }
}
