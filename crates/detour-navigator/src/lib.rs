//! Tiled navmesh navigator
//!
//! Keeps one tiled navmesh per agent shape in sync with a changing world.
//! Collision geometry, terrain and water are tracked per tile; changed tiles are
//! rebuilt on worker threads, cached in memory and optionally on disk, and
//! published tile by tile so queries always see whole tiles.
//!
//! The main entry point is [`Navigator`].

// Allow unused code in tests - fixtures are shared between test modules
#![cfg_attr(test, allow(unused))]

pub mod agent_bounds;
pub mod area_type;
pub mod async_updater;
pub mod debug;
pub mod extractor;
pub mod generator;
pub mod nav_mesh_cache_item;
pub mod nav_mesh_manager;
pub mod navigator;
pub mod query;
pub mod recast_mesh;
pub mod recast_mesh_builder;
pub mod recast_mesh_manager;
pub mod settings;
pub mod shapes;
pub mod stats;
pub mod tile_db;
pub mod tile_position;
pub mod tiles_cache;
pub mod wait;

#[cfg(test)]
mod test_helpers;

pub use agent_bounds::{AgentBounds, CollisionShapeType};
pub use area_type::{AreaCosts, AreaType, Flags};
pub use generator::{GridTileGenerator, TileGenerator};
pub use nav_mesh_cache_item::{NavMeshCacheItem, SharedNavMeshCacheItem, UpdateNavMeshStatus};
pub use navigator::Navigator;
pub use query::Status;
pub use recast_mesh::{CellWater, FlatHeightfield, Heightfield, Mesh, RecastMesh, Version, Water};
pub use recast_mesh_builder::RecastMeshBuilder;
pub use recast_mesh_manager::{ChangeType, ObjectId, UpdateGuard};
pub use settings::{DetourSettings, NavigatorSettings, RecastSettings};
pub use shapes::{
    ChildShape, CollisionGeometry, HeightFieldGeometry, HeightfieldShape, MutableCompound, ObjectShapes,
    ObjectTransform,
};
pub use stats::{Stats, UpdaterStats};
pub use tile_position::{ActiveTiles, TileBounds, TilePosition};
pub use wait::{LoadingListener, LogLoadingListener, WaitConditionType};
