//! Agent shapes and the grid parameters derived from them

use crate::area_type::{area_flags_table, AreaType};
use crate::settings::RecastSettings;
use glam::Vec3;
use navmesh_grid::{GridConfig, QueryParams};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Smallest walkable height, in cells, a navmesh can be built for
const MIN_WALKABLE_HEIGHT: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollisionShapeType {
    /// Axis-aligned box that never rotates
    Aabb,
    /// Box rotating with the agent around Z
    RotatingBox,
    Cylinder,
}

/// Class of movers sharing one navmesh
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentBounds {
    pub shape_type: CollisionShapeType,
    pub half_extents: Vec3,
}

impl AgentBounds {
    pub fn new(shape_type: CollisionShapeType, half_extents: Vec3) -> Self {
        Self {
            shape_type,
            half_extents,
        }
    }

    fn key(&self) -> (CollisionShapeType, [u32; 3]) {
        (
            self.shape_type,
            [
                self.half_extents.x.to_bits(),
                self.half_extents.y.to_bits(),
                self.half_extents.z.to_bits(),
            ],
        )
    }

    /// Horizontal radius of the circle the agent occupies
    pub fn radius(&self) -> f32 {
        let h = self.half_extents;
        match self.shape_type {
            CollisionShapeType::Aabb => h.x.max(h.y) * std::f32::consts::SQRT_2,
            CollisionShapeType::RotatingBox => h.x,
            CollisionShapeType::Cylinder => h.x.max(h.y),
        }
    }

    pub fn height(&self) -> f32 {
        self.half_extents.z * 2.0
    }

    pub fn walkable_height(&self, settings: &RecastSettings) -> i32 {
        (self.height() / settings.cell_height).ceil() as i32
    }

    pub fn walkable_radius(&self, settings: &RecastSettings) -> i32 {
        (self.radius() / settings.cell_size).ceil() as i32
    }

    pub fn walkable_climb(&self, settings: &RecastSettings) -> i32 {
        (settings.max_climb / settings.cell_height).floor() as i32
    }

    /// Depth below the water surface at which the agent starts swimming, in cells
    pub fn swim_depth(&self, settings: &RecastSettings) -> i32 {
        (settings.swim_height_scale * self.height() / settings.cell_height).ceil() as i32
    }

    /// Whether a navmesh can be built for these bounds
    pub fn is_supported(&self, settings: &RecastSettings) -> bool {
        let h = self.half_extents;
        h.is_finite()
            && h.min_element() > 0.0
            && h.max_element() <= settings.max_agent_half_extent
            && self.walkable_height(settings) >= MIN_WALKABLE_HEIGHT
            && self.walkable_radius(settings) <= settings.border_size
    }

    /// Grid configuration for tiles of this agent
    pub fn grid_config(&self, settings: &RecastSettings) -> GridConfig {
        GridConfig {
            cell_size: settings.cell_size,
            cell_height: settings.cell_height,
            tile_cells: settings.tile_size,
            border_cells: settings.border_size,
            walkable_slope_angle: settings.max_slope,
            walkable_height: self.walkable_height(settings),
            walkable_climb: self.walkable_climb(settings),
            walkable_radius: self.walkable_radius(settings),
            swim_depth: self.swim_depth(settings),
            water_area: AreaType::Water.id(),
            area_flags: area_flags_table(),
        }
    }

    pub fn query_params(&self, settings: &RecastSettings, max_nodes: usize) -> QueryParams {
        QueryParams {
            cell_size: settings.cell_size,
            tile_cells: settings.tile_size,
            walkable_climb: self.walkable_climb(settings) as f32 * settings.cell_height,
            max_nodes,
        }
    }
}

impl PartialEq for AgentBounds {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AgentBounds {}

impl Hash for AgentBounds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for AgentBounds {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgentBounds {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for AgentBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({}, {}, {})",
            self.shape_type, self.half_extents.x, self.half_extents.y, self.half_extents.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(x: f32, y: f32, z: f32) -> AgentBounds {
        AgentBounds::new(CollisionShapeType::Aabb, Vec3::new(x, y, z))
    }

    #[test]
    fn test_radius_per_shape_type() {
        let h = Vec3::new(0.3, 0.4, 1.0);
        assert!((AgentBounds::new(CollisionShapeType::Aabb, h).radius() - 0.4 * std::f32::consts::SQRT_2).abs() < 1e-6);
        assert_eq!(AgentBounds::new(CollisionShapeType::RotatingBox, h).radius(), 0.3);
        assert_eq!(AgentBounds::new(CollisionShapeType::Cylinder, h).radius(), 0.4);
    }

    #[test]
    fn test_supported_bounds() {
        let settings = RecastSettings::default();
        assert!(bounds(0.3, 0.3, 0.9).is_supported(&settings));
        assert!(!bounds(0.0, 0.3, 0.9).is_supported(&settings));
        assert!(!bounds(-0.3, 0.3, 0.9).is_supported(&settings));
        assert!(!bounds(f32::NAN, 0.3, 0.9).is_supported(&settings));
        assert!(!bounds(0.3, 0.3, 0.1).is_supported(&settings));
        assert!(!bounds(10.0, 0.3, 0.9).is_supported(&settings));
    }

    #[test]
    fn test_grid_config_is_valid() {
        let settings = RecastSettings::default();
        let config = bounds(0.3, 0.3, 0.9).grid_config(&settings);
        assert_eq!(config.walkable_height, 18);
        assert_eq!(config.walkable_climb, 5);
        assert_eq!(config.walkable_radius, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_equality_and_ordering() {
        let a = bounds(0.3, 0.3, 0.9);
        assert_eq!(a, bounds(0.3, 0.3, 0.9));
        assert_ne!(a, AgentBounds::new(CollisionShapeType::Cylinder, a.half_extents));
        assert!(bounds(0.2, 0.3, 0.9) < a);
    }
}
