//! Configuration for grid tile generation

use crate::filter::{NodeFlags, MAX_AREAS};

/// Configuration parameters for building one grid tile
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// The width/depth resolution of the grid (cell size)
    pub cell_size: f32,
    /// The height resolution of the grid (cell height)
    pub cell_height: f32,
    /// Number of cells along one side of a tile, excluding the border
    pub tile_cells: i32,
    /// Number of extra cells rasterized around the tile on every side
    pub border_cells: i32,

    /// The maximum slope in degrees that is considered walkable
    pub walkable_slope_angle: f32,
    /// Minimum floor to ceiling height, in cell heights
    pub walkable_height: i32,
    /// Maximum step between neighbouring nodes, in cell heights
    pub walkable_climb: i32,
    /// Distance to erode the walkable area from obstacles, in cells
    pub walkable_radius: i32,

    /// Depth below the water surface where ground stops being walkable, in cell heights
    pub swim_depth: i32,
    /// Area id assigned to water surface nodes
    pub water_area: u8,
    /// Traversal flags assigned to each area id
    pub area_flags: Vec<NodeFlags>,
}

impl Default for GridConfig {
    fn default() -> Self {
        let mut area_flags = vec![NodeFlags::WALK; MAX_AREAS];
        area_flags[0] = NodeFlags::empty();
        Self {
            cell_size: 0.25,
            cell_height: 0.1,
            tile_cells: 64,
            border_cells: 16,
            walkable_slope_angle: 49.0,
            walkable_height: 18,
            walkable_climb: 5,
            walkable_radius: 2,
            swim_depth: 16,
            water_area: 1,
            area_flags,
        }
    }
}

impl GridConfig {
    /// Creates a new GridConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells along one side of the rasterized grid, border included
    pub fn grid_cells(&self) -> i32 {
        self.tile_cells + self.border_cells * 2
    }

    /// World size of one tile side
    pub fn tile_world_size(&self) -> f32 {
        self.tile_cells as f32 * self.cell_size
    }

    /// Walkable climb in world units
    pub fn walkable_climb_world(&self) -> f32 {
        self.walkable_climb as f32 * self.cell_height
    }

    /// Flags of an area id; unknown ids carry no flags
    pub fn flags_for_area(&self, area: u8) -> NodeFlags {
        self.area_flags
            .get(area as usize)
            .copied()
            .unwrap_or(NodeFlags::empty())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cell_size > 0.0) {
            return Err("Cell size must be positive".to_string());
        }
        if !(self.cell_height > 0.0) {
            return Err("Cell height must be positive".to_string());
        }
        if self.tile_cells <= 0 {
            return Err("Tile size must be positive".to_string());
        }
        if self.border_cells < 0 {
            return Err("Border size cannot be negative".to_string());
        }
        if self.walkable_height <= 0 {
            return Err("Walkable height must be positive".to_string());
        }
        if self.walkable_climb < 0 {
            return Err("Walkable climb cannot be negative".to_string());
        }
        if self.walkable_radius < 0 {
            return Err("Walkable radius cannot be negative".to_string());
        }
        if self.walkable_radius > self.border_cells {
            return Err("Walkable radius cannot exceed the border size".to_string());
        }
        if !(0.0..90.0).contains(&self.walkable_slope_angle) {
            return Err("Walkable slope must be in [0, 90) degrees".to_string());
        }
        Ok(())
    }
}
