//! Per-agent navmeshes and the jobs that keep them current

use crate::agent_bounds::AgentBounds;
use crate::async_updater::AsyncNavMeshUpdater;
use crate::generator::TileGenerator;
use crate::nav_mesh_cache_item::{NavMeshCacheItem, SharedNavMeshCacheItem};
use crate::recast_mesh_manager::{ChangeType, ChangedTile, TileCachedRecastMeshManager, UpdateGuard};
use crate::settings::NavigatorSettings;
use crate::stats::Stats;
use crate::tile_db::TileDb;
use crate::tile_position::{get_tile_position, ActiveTiles, TilePosition};
use crate::wait::{LoadingListener, WaitConditionType};
use glam::{IVec2, Vec3};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct AgentEntry {
    nav_mesh: SharedNavMeshCacheItem,
    /// Number of `add_agent` calls not yet matched by `remove_agent`
    refs: usize,
    /// Recast mesh generation the navmesh was last filled for
    synced_generation: Option<u64>,
}

pub struct NavMeshManager {
    settings: NavigatorSettings,
    recast_mesh_manager: Arc<TileCachedRecastMeshManager>,
    agents: Mutex<BTreeMap<AgentBounds, AgentEntry>>,
    updater: AsyncNavMeshUpdater,
}

impl NavMeshManager {
    pub fn new(settings: NavigatorSettings, generator: Arc<dyn TileGenerator>) -> Self {
        let recast_mesh_manager = Arc::new(TileCachedRecastMeshManager::new(
            settings.recast.clone(),
            settings.min_update_interval(),
        ));
        let db = open_db(&settings);
        let updater = AsyncNavMeshUpdater::new(settings.clone(), recast_mesh_manager.clone(), generator, db);
        Self {
            settings,
            recast_mesh_manager,
            agents: Mutex::new(BTreeMap::new()),
            updater,
        }
    }

    pub fn recast_mesh_manager(&self) -> &TileCachedRecastMeshManager {
        &self.recast_mesh_manager
    }

    fn agents(&self) -> MutexGuard<'_, BTreeMap<AgentBounds, AgentEntry>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an agent; false when no navmesh can be built for its bounds
    pub fn add_agent(&self, agent: AgentBounds) -> bool {
        if !agent.is_supported(&self.settings.recast) {
            log::warn!("Rejected unsupported agent {agent}");
            return false;
        }
        let mut agents = self.agents();
        match agents.get_mut(&agent) {
            Some(entry) => entry.refs += 1,
            None => {
                let generation = self.recast_mesh_manager.version().generation;
                agents.insert(
                    agent,
                    AgentEntry {
                        nav_mesh: SharedNavMeshCacheItem::new(NavMeshCacheItem::new(generation)),
                        refs: 1,
                        synced_generation: None,
                    },
                );
                log::info!("Added agent {agent}");
            }
        }
        true
    }

    /// Drops one registration; the navmesh goes away with the last one
    pub fn remove_agent(&self, agent: &AgentBounds) -> bool {
        let mut agents = self.agents();
        let Some(entry) = agents.get_mut(agent) else {
            return false;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            agents.remove(agent);
            log::info!("Removed agent {agent}");
        }
        true
    }

    /// Commits pending changes around `player_position` and queues tile jobs.
    ///
    /// The guard, when given, is released before jobs are posted.
    pub fn update(&self, player_position: Vec3, guard: Option<UpdateGuard<'_>>) {
        let player_tile = get_tile_position(&self.settings.recast, player_position.truncate());
        let active = ActiveTiles::new(player_tile, self.settings.max_tiles_number);

        let mut guard = guard;
        self.recast_mesh_manager.set_active_tiles(active, guard.as_mut());
        let changed = self.recast_mesh_manager.take_changed_tiles(guard.as_mut());
        drop(guard);

        let version = self.recast_mesh_manager.version();
        let worldspace = self.recast_mesh_manager.worldspace();
        let mut agents = self.agents();
        let mut initial_tiles: Option<Vec<TilePosition>> = None;

        for (agent, entry) in agents.iter_mut() {
            let mut tiles: BTreeMap<(i32, i32), ChangedTile> =
                changed.iter().map(|(t, c)| ((t.x, t.y), *c)).collect();

            if entry.synced_generation != Some(version.generation) {
                if entry.synced_generation.is_some() {
                    entry.nav_mesh.lock().reset(version.generation);
                }
                let initial = initial_tiles.get_or_insert_with(|| {
                    self.recast_mesh_manager
                        .objects_range()
                        .iter()
                        .filter(|t| active.contains(*t))
                        .collect()
                });
                for tile in initial.iter() {
                    merge_change(&mut tiles, *tile, ChangeType::Add);
                }
                entry.synced_generation = Some(version.generation);
            }

            let tiles: Vec<(TilePosition, ChangedTile)> =
                tiles.into_iter().map(|((x, y), c)| (IVec2::new(x, y), c)).collect();
            if !tiles.is_empty() {
                log::debug!(
                    "Posting {} navmesh jobs for agent {agent} around tile ({}, {}), recast mesh {:?}",
                    tiles.len(),
                    player_tile.x,
                    player_tile.y,
                    version
                );
            }
            self.updater.post(*agent, &entry.nav_mesh, player_tile, &worldspace, &tiles);
        }
    }

    pub fn wait(&self, condition: WaitConditionType, listener: Option<&mut dyn LoadingListener>) -> bool {
        self.updater.wait(condition, listener)
    }

    pub fn get_nav_mesh(&self, agent: &AgentBounds) -> Option<SharedNavMeshCacheItem> {
        self.agents().get(agent).map(|e| e.nav_mesh.clone())
    }

    pub fn get_nav_meshes(&self) -> Vec<(AgentBounds, SharedNavMeshCacheItem)> {
        self.agents()
            .iter()
            .map(|(agent, entry)| (*agent, entry.nav_mesh.clone()))
            .collect()
    }

    pub fn report_stats(&self) -> Stats {
        Stats {
            updater: self.updater.stats(),
            recast_mesh_manager_revision: self.recast_mesh_manager.version().revision,
            objects: self.recast_mesh_manager.object_count(),
            agents: self.agents().len(),
        }
    }
}

fn merge_change(tiles: &mut BTreeMap<(i32, i32), ChangedTile>, tile: TilePosition, change_type: ChangeType) {
    tiles
        .entry((tile.x, tile.y))
        .and_modify(|c| {
            c.change_type = c.change_type.merge(change_type);
            c.not_before = None;
        })
        .or_insert(ChangedTile {
            change_type,
            not_before: None,
        });
}

fn open_db(settings: &NavigatorSettings) -> Option<TileDb> {
    if !settings.enable_nav_mesh_disk_cache {
        return None;
    }
    match TileDb::open(settings.nav_mesh_db_path.clone(), settings.max_nav_mesh_db_file_size) {
        Ok(db) => Some(db),
        Err(e) => {
            log::warn!(
                "Failed to open navmesh tile DB at {}, continuing without it: {e}",
                settings.nav_mesh_db_path.display()
            );
            None
        }
    }
}
