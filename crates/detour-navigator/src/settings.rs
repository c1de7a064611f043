//! Navigator settings
//!
//! All lengths are world units unless the field name says otherwise.

use navigator_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for turning geometry into walkable tiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecastSettings {
    /// Horizontal cell size
    pub cell_size: f32,
    /// Vertical cell size
    pub cell_height: f32,
    /// Tile side in cells
    pub tile_size: i32,
    /// Extra cells rasterized around every tile
    pub border_size: i32,
    /// Maximum walkable slope in degrees
    pub max_slope: f32,
    /// Maximum step height
    pub max_climb: f32,
    /// Fraction of the agent height that must be under water before it swims
    pub swim_height_scale: f32,
    /// Largest supported agent half extent
    pub max_agent_half_extent: f32,
}

impl Default for RecastSettings {
    fn default() -> Self {
        Self {
            cell_size: 0.25,
            cell_height: 0.1,
            tile_size: 64,
            border_size: 16,
            max_slope: 49.0,
            max_climb: 0.5,
            swim_height_scale: 0.89,
            max_agent_half_extent: 4.0,
        }
    }
}

impl RecastSettings {
    /// World size of one tile side
    pub fn tile_world_size(&self) -> f32 {
        self.cell_size * self.tile_size as f32
    }

    /// World size of the border
    pub fn border_world_size(&self) -> f32 {
        self.cell_size * self.border_size as f32
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.cell_size > 0.0) {
            return Err("Cell size must be positive".to_string());
        }
        if !(self.cell_height > 0.0) {
            return Err("Cell height must be positive".to_string());
        }
        if self.tile_size <= 0 {
            return Err("Tile size must be positive".to_string());
        }
        if self.border_size < 0 {
            return Err("Border size cannot be negative".to_string());
        }
        if !(0.0..90.0).contains(&self.max_slope) {
            return Err("Max slope must be in [0, 90) degrees".to_string());
        }
        if self.max_climb < 0.0 {
            return Err("Max climb cannot be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.swim_height_scale) {
            return Err("Swim height scale must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Settings for queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetourSettings {
    /// Search node budget of one query
    pub max_nav_mesh_query_nodes: usize,
    /// Longest node corridor a path search may return
    pub max_polygon_path_size: usize,
    /// Most points a smoothed path may contain
    pub max_smooth_path_size: usize,
}

impl Default for DetourSettings {
    fn default() -> Self {
        Self {
            max_nav_mesh_query_nodes: 65536,
            max_polygon_path_size: 4096,
            max_smooth_path_size: 1024,
        }
    }
}

impl DetourSettings {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_nav_mesh_query_nodes == 0 {
            return Err("Query node budget must be positive".to_string());
        }
        if self.max_polygon_path_size == 0 || self.max_smooth_path_size < 2 {
            return Err("Path size limits are too small".to_string());
        }
        Ok(())
    }
}

/// Complete navigator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorSettings {
    pub recast: RecastSettings,
    pub detour: DetourSettings,
    /// Worker threads; zero processes jobs on the thread calling `wait`
    pub async_nav_mesh_updater_threads: usize,
    /// Byte budget of the in-memory generated tile cache
    pub max_nav_mesh_tiles_cache_size: usize,
    /// Most tiles one navmesh may hold around the player
    pub max_tiles_number: usize,
    /// Minimum time between two rebuilds caused by the same object
    pub min_update_interval_ms: u64,
    /// Tiles closer than this to the player are required by `WaitConditionType::RequiredTilesPresent`
    pub wait_until_min_distance_to_player: i32,
    pub enable_nav_mesh_disk_cache: bool,
    pub write_to_nav_mesh_db: bool,
    pub nav_mesh_db_path: PathBuf,
    /// Byte budget of the on-disk tile cache
    pub max_nav_mesh_db_file_size: u64,
    pub enable_write_recast_mesh_to_file: bool,
    pub recast_mesh_path_prefix: String,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            recast: RecastSettings::default(),
            detour: DetourSettings::default(),
            async_nav_mesh_updater_threads: 1,
            max_nav_mesh_tiles_cache_size: 64 * 1024 * 1024,
            max_tiles_number: 512,
            min_update_interval_ms: 250,
            wait_until_min_distance_to_player: 5,
            enable_nav_mesh_disk_cache: false,
            write_to_nav_mesh_db: true,
            nav_mesh_db_path: PathBuf::from("navmesh.db"),
            max_nav_mesh_db_file_size: 500 * 1024 * 1024,
            enable_write_recast_mesh_to_file: false,
            recast_mesh_path_prefix: String::new(),
        }
    }
}

impl NavigatorSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads settings from JSON; missing fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        settings.validate().map_err(Error::InvalidSettings)?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }

    pub fn with_recast(mut self, recast: RecastSettings) -> Self {
        self.recast = recast;
        self
    }

    pub fn with_detour(mut self, detour: DetourSettings) -> Self {
        self.detour = detour;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.async_nav_mesh_updater_threads = threads;
        self
    }

    pub fn with_max_tiles_number(mut self, max_tiles_number: usize) -> Self {
        self.max_tiles_number = max_tiles_number;
        self
    }

    pub fn with_min_update_interval(mut self, interval: Duration) -> Self {
        self.min_update_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_wait_until_min_distance_to_player(mut self, distance: i32) -> Self {
        self.wait_until_min_distance_to_player = distance;
        self
    }

    pub fn with_tiles_cache_size(mut self, bytes: usize) -> Self {
        self.max_nav_mesh_tiles_cache_size = bytes;
        self
    }

    pub fn with_nav_mesh_db(mut self, path: impl Into<PathBuf>, write: bool) -> Self {
        self.enable_nav_mesh_disk_cache = true;
        self.nav_mesh_db_path = path.into();
        self.write_to_nav_mesh_db = write;
        self
    }

    pub fn with_max_nav_mesh_db_file_size(mut self, bytes: u64) -> Self {
        self.max_nav_mesh_db_file_size = bytes;
        self
    }

    pub fn with_recast_mesh_dump(mut self, prefix: impl Into<String>) -> Self {
        self.enable_write_recast_mesh_to_file = true;
        self.recast_mesh_path_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.recast.validate()?;
        self.detour.validate()?;
        if self.max_tiles_number == 0 {
            return Err("Max tiles number must be positive".to_string());
        }
        if self.wait_until_min_distance_to_player < 0 {
            return Err("Wait distance cannot be negative".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = NavigatorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.recast.tile_world_size(), 16.0);
        assert_eq!(settings.min_update_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_builder() {
        let settings = NavigatorSettings::new()
            .with_threads(0)
            .with_max_tiles_number(64)
            .with_min_update_interval(Duration::from_millis(10))
            .with_nav_mesh_db("/tmp/db", false);
        assert_eq!(settings.async_nav_mesh_updater_threads, 0);
        assert_eq!(settings.max_tiles_number, 64);
        assert_eq!(settings.min_update_interval_ms, 10);
        assert!(settings.enable_nav_mesh_disk_cache);
        assert!(!settings.write_to_nav_mesh_db);
    }

    #[test]
    fn test_from_json_keeps_defaults_for_missing_fields() {
        let settings = NavigatorSettings::from_json_str(
            r#"{ "max_tiles_number": 128, "recast": { "cell_size": 0.5 } }"#,
        )
        .unwrap();
        assert_eq!(settings.max_tiles_number, 128);
        assert_eq!(settings.recast.cell_size, 0.5);
        assert_eq!(settings.recast.tile_size, 64);
        assert_eq!(settings.async_nav_mesh_updater_threads, 1);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = NavigatorSettings::default().with_max_tiles_number(100);
        let json = settings.to_json_string().unwrap();
        assert_eq!(NavigatorSettings::from_json_str(&json).unwrap(), settings);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(NavigatorSettings::from_json_str(r#"{ "max_tiles_number": 0 }"#).is_err());
        assert!(NavigatorSettings::from_json_str(r#"{ "recast": { "cell_size": -1.0 } }"#).is_err());
        assert!(NavigatorSettings::from_json_str("not json").is_err());
    }
}
