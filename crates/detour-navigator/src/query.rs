//! Read-only queries over one navmesh snapshot

use crate::agent_bounds::AgentBounds;
use crate::area_type::{make_query_filter, AreaCosts, Flags};
use crate::nav_mesh_cache_item::NavMeshCacheItem;
use crate::settings::{NavigatorSettings, RecastSettings};
use glam::Vec3;
use navmesh_grid::{GridQuery, NodeRef, PathResult};

/// Outcome of a path search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    /// The end is unreachable; the path leads to the closest reachable point
    PartialPath,
    StartPolygonNotFound,
    NavMeshNotFound,
}

/// Box around a requested position searched for the closest node
pub fn search_half_extents(agent: &AgentBounds, settings: &RecastSettings) -> Vec3 {
    let horizontal = agent.radius() + settings.cell_size * 2.0;
    Vec3::new(horizontal, horizontal, agent.height() + settings.max_climb)
}

fn make_query<'a>(
    nav_mesh: &'a NavMeshCacheItem,
    agent: &AgentBounds,
    settings: &NavigatorSettings,
) -> GridQuery<'a, NavMeshCacheItem> {
    GridQuery::new(
        nav_mesh,
        agent.query_params(&settings.recast, settings.detour.max_nav_mesh_query_nodes),
    )
}

/// Finds a path from `start` to `end` and appends its corner points to `out`.
///
/// `end_tolerance` widens the horizontal search for the end node.
#[allow(clippy::too_many_arguments)]
pub fn find_path(
    nav_mesh: &NavMeshCacheItem,
    agent: &AgentBounds,
    settings: &NavigatorSettings,
    start: Vec3,
    end: Vec3,
    include_flags: Flags,
    costs: &AreaCosts,
    end_tolerance: f32,
    out: &mut impl Extend<Vec3>,
) -> Status {
    let query = make_query(nav_mesh, agent, settings);
    let filter = make_query_filter(include_flags, costs);
    let half_extents = search_half_extents(agent, &settings.recast);

    let Some((start_node, start_pos)) = query.find_nearest_node(start, half_extents, &filter) else {
        return Status::StartPolygonNotFound;
    };
    let end_half_extents = half_extents + Vec3::new(end_tolerance, end_tolerance, 0.0);
    let end_target = query.find_nearest_node(end, end_half_extents, &filter);
    let (end_node, end_pos) = end_target.unwrap_or((
        NodeRef {
            cell: query.cell_of(end),
            layer: u16::MAX,
        },
        end,
    ));

    let Some(result) = query.find_path(start_node, end_node, end_pos, &filter) else {
        return Status::StartPolygonNotFound;
    };
    let (mut nodes, mut complete) = match result {
        PathResult::Complete(nodes) => (nodes, true),
        PathResult::Partial(nodes) => (nodes, false),
    };
    if nodes.len() > settings.detour.max_polygon_path_size {
        nodes.truncate(settings.detour.max_polygon_path_size);
        complete = false;
    }

    let last_pos = match nodes.last() {
        Some(_) if complete => end_pos,
        Some(last) => query.node_position(*last).unwrap_or(start_pos),
        None => start_pos,
    };
    let mut points = query.find_straight_path(start_pos, last_pos, &nodes, &filter);
    points.truncate(settings.detour.max_smooth_path_size);
    out.extend(points);

    if complete {
        Status::Success
    } else {
        Status::PartialPath
    }
}

/// First point where the segment `start -> end` leaves the navmesh, or `end`
pub fn raycast(
    nav_mesh: &NavMeshCacheItem,
    agent: &AgentBounds,
    settings: &NavigatorSettings,
    start: Vec3,
    end: Vec3,
    include_flags: Flags,
) -> Option<Vec3> {
    let query = make_query(nav_mesh, agent, settings);
    let filter = make_query_filter(include_flags, &AreaCosts::default());
    let (start_node, start_pos) =
        query.find_nearest_node(start, search_half_extents(agent, &settings.recast), &filter)?;

    let walk = query.walk(start_node, start_pos, end, &filter, f32::INFINITY);
    if !walk.blocked {
        return Some(end);
    }
    let hit = start_pos.lerp(end, walk.t);
    let height = query.node(walk.last).map_or(hit.z, |n| n.height);
    Some(hit.truncate().extend(height))
}

/// Random navmesh point within `max_radius` of `center`, reachable from it
pub fn find_random_point_around_circle(
    nav_mesh: &NavMeshCacheItem,
    agent: &AgentBounds,
    settings: &NavigatorSettings,
    center: Vec3,
    max_radius: f32,
    include_flags: Flags,
    rng: &mut fastrand::Rng,
) -> Option<Vec3> {
    let query = make_query(nav_mesh, agent, settings);
    let filter = make_query_filter(include_flags, &AreaCosts::default());
    let (start_node, _) =
        query.find_nearest_node(center, search_half_extents(agent, &settings.recast), &filter)?;
    query
        .find_random_point_around_circle(start_node, center, max_radius, &filter, rng)
        .map(|(_, point)| point)
}

/// Closest navmesh point inside the box `position ± search_half_extents`
pub fn find_nearest_nav_mesh_position(
    nav_mesh: &NavMeshCacheItem,
    agent: &AgentBounds,
    settings: &NavigatorSettings,
    position: Vec3,
    search_half_extents: Vec3,
    include_flags: Flags,
) -> Option<Vec3> {
    let query = make_query(nav_mesh, agent, settings);
    let filter = make_query_filter(include_flags, &AreaCosts::default());
    query
        .find_nearest_node(position, search_half_extents, &filter)
        .map(|(_, point)| point)
}
