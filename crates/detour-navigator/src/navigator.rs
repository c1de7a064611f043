//! Navigator facade
//!
//! Tracks agents and world geometry, turns changes into tile jobs on
//! [`Navigator::update`] and answers queries against the published navmeshes.
//!
//! ```no_run
//! use detour_navigator::{
//!     AgentBounds, CollisionGeometry, CollisionShapeType, Navigator, NavigatorSettings, ObjectId,
//!     ObjectShapes, ObjectTransform, WaitConditionType,
//! };
//! use glam::Vec3;
//! use std::sync::Arc;
//!
//! # fn example() -> navigator_common::Result<()> {
//! let navigator = Navigator::new(NavigatorSettings::default())?;
//! let agent = AgentBounds::new(CollisionShapeType::Aabb, Vec3::new(0.3, 0.3, 0.9));
//! navigator.add_agent(agent);
//!
//! let ground = Arc::new(CollisionGeometry::Box {
//!     half_extents: Vec3::new(50.0, 50.0, 0.5),
//! });
//! let mut guard = navigator.make_update_guard();
//! navigator.add_object(
//!     ObjectId(1),
//!     ObjectShapes::new(ground, ObjectTransform::from_position(Vec3::new(0.0, 0.0, -0.5))),
//!     Some(&mut guard),
//! );
//! navigator.update(Vec3::ZERO, Some(guard));
//! navigator.wait(WaitConditionType::AllJobsDone, None);
//! # Ok(())
//! # }
//! ```

use crate::agent_bounds::AgentBounds;
use crate::area_type::{AreaCosts, Flags};
use crate::generator::{GridTileGenerator, TileGenerator};
use crate::nav_mesh_cache_item::SharedNavMeshCacheItem;
use crate::nav_mesh_manager::NavMeshManager;
use crate::query::{self, Status};
use crate::recast_mesh::{RecastMesh, Water};
use crate::recast_mesh_manager::{ObjectId, UpdateGuard};
use crate::settings::NavigatorSettings;
use crate::shapes::{HeightfieldShape, ObjectShapes};
use crate::stats::Stats;
use crate::tile_position::TilePosition;
use crate::wait::{LoadingListener, WaitConditionType};
use glam::{IVec2, Vec3};
use navigator_common::{Error, Result};
use std::sync::Arc;

pub struct Navigator {
    settings: NavigatorSettings,
    manager: NavMeshManager,
}

impl Navigator {
    /// Creates a navigator generating tiles with the walkable grid
    pub fn new(settings: NavigatorSettings) -> Result<Self> {
        Self::with_generator(settings, Arc::new(GridTileGenerator))
    }

    pub fn with_generator(settings: NavigatorSettings, generator: Arc<dyn TileGenerator>) -> Result<Self> {
        settings.validate().map_err(Error::InvalidSettings)?;
        let manager = NavMeshManager::new(settings.clone(), generator);
        Ok(Self { settings, manager })
    }

    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    /// Registers an agent; false when its bounds are unsupported
    pub fn add_agent(&self, agent: AgentBounds) -> bool {
        self.manager.add_agent(agent)
    }

    pub fn remove_agent(&self, agent: &AgentBounds) -> bool {
        self.manager.remove_agent(agent)
    }

    /// Locks the tracked geometry so a batch of changes lands at once.
    ///
    /// Pass the guard to every change of the batch and then to [`Navigator::update`].
    /// Calling anything else on the navigator while holding it blocks.
    pub fn make_update_guard(&self) -> UpdateGuard<'_> {
        self.manager.recast_mesh_manager().make_update_guard()
    }

    pub fn add_object(&self, id: ObjectId, shapes: ObjectShapes, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().add_object(id, shapes, guard)
    }

    pub fn update_object(&self, id: ObjectId, shapes: ObjectShapes, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().update_object(id, shapes, guard)
    }

    pub fn remove_object(&self, id: ObjectId, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().remove_object(id, guard)
    }

    pub fn add_heightfield(
        &self,
        cell_position: IVec2,
        cell_size: i32,
        shape: HeightfieldShape,
        guard: Option<&mut UpdateGuard<'_>>,
    ) -> bool {
        self.manager
            .recast_mesh_manager()
            .add_heightfield(cell_position, cell_size, shape, guard)
    }

    pub fn remove_heightfield(&self, cell_position: IVec2, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().remove_heightfield(cell_position, guard)
    }

    pub fn add_water(&self, cell_position: IVec2, water: Water, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().add_water(cell_position, water, guard)
    }

    pub fn remove_water(&self, cell_position: IVec2, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.manager.recast_mesh_manager().remove_water(cell_position, guard)
    }

    /// Switches to another worldspace; every active tile is rebuilt
    pub fn set_worldspace(&self, worldspace: &str, guard: Option<&mut UpdateGuard<'_>>) {
        log::info!("Switching navigator worldspace to \"{worldspace}\"");
        self.manager.recast_mesh_manager().set_worldspace(worldspace, guard);
    }

    /// Commits pending changes and queues the affected tiles; never blocks on jobs
    pub fn update(&self, player_position: Vec3, guard: Option<UpdateGuard<'_>>) {
        self.manager.update(player_position, guard);
    }

    /// Blocks until `condition` holds or the listener gives up
    pub fn wait(&self, condition: WaitConditionType, listener: Option<&mut dyn LoadingListener>) -> bool {
        self.manager.wait(condition, listener)
    }

    pub fn get_nav_mesh(&self, agent: &AgentBounds) -> Option<SharedNavMeshCacheItem> {
        self.manager.get_nav_mesh(agent)
    }

    pub fn get_nav_meshes(&self) -> Vec<(AgentBounds, SharedNavMeshCacheItem)> {
        self.manager.get_nav_meshes()
    }

    /// Per-tile builds of the tracked geometry, for diagnostics
    pub fn get_recast_mesh_tiles(&self) -> Vec<(TilePosition, Arc<RecastMesh>)> {
        self.manager.recast_mesh_manager().get_recast_mesh_tiles()
    }

    pub fn report_stats(&self) -> Stats {
        self.manager.report_stats()
    }

    /// Finds a path and appends its points to `out`
    #[allow(clippy::too_many_arguments)]
    pub fn find_path(
        &self,
        agent: &AgentBounds,
        start: Vec3,
        end: Vec3,
        include_flags: Flags,
        costs: &AreaCosts,
        end_tolerance: f32,
        out: &mut impl Extend<Vec3>,
    ) -> Status {
        let Some(nav_mesh) = self.get_nav_mesh(agent) else {
            return Status::NavMeshNotFound;
        };
        let nav_mesh = nav_mesh.lock_const();
        query::find_path(
            &nav_mesh,
            agent,
            &self.settings,
            start,
            end,
            include_flags,
            costs,
            end_tolerance,
            out,
        )
    }

    pub fn raycast(&self, agent: &AgentBounds, start: Vec3, end: Vec3, include_flags: Flags) -> Option<Vec3> {
        let nav_mesh = self.get_nav_mesh(agent)?;
        let nav_mesh = nav_mesh.lock_const();
        query::raycast(&nav_mesh, agent, &self.settings, start, end, include_flags)
    }

    pub fn find_random_point_around_circle(
        &self,
        agent: &AgentBounds,
        center: Vec3,
        max_radius: f32,
        include_flags: Flags,
        rng: &mut fastrand::Rng,
    ) -> Option<Vec3> {
        let nav_mesh = self.get_nav_mesh(agent)?;
        let nav_mesh = nav_mesh.lock_const();
        query::find_random_point_around_circle(&nav_mesh, agent, &self.settings, center, max_radius, include_flags, rng)
    }

    pub fn find_nearest_nav_mesh_position(
        &self,
        agent: &AgentBounds,
        position: Vec3,
        search_half_extents: Vec3,
        include_flags: Flags,
    ) -> Option<Vec3> {
        let nav_mesh = self.get_nav_mesh(agent)?;
        let nav_mesh = nav_mesh.lock_const();
        query::find_nearest_nav_mesh_position(
            &nav_mesh,
            agent,
            &self.settings,
            position,
            search_half_extents,
            include_flags,
        )
    }
}
