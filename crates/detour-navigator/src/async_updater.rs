//! Background tile updates
//!
//! Jobs are keyed by (agent, tile): posting a tile that already waits merges the
//! change types and keeps the earliest processing time, and a tile is never
//! processed by two workers at once. With zero worker threads every job runs
//! inside [`AsyncNavMeshUpdater::wait`].

use crate::agent_bounds::AgentBounds;
use crate::debug::write_recast_mesh_obj;
use crate::generator::TileGenerator;
use crate::nav_mesh_cache_item::{SharedNavMeshCacheItem, UpdateNavMeshStatus, WeakNavMeshCacheItem};
use crate::recast_mesh::{RecastMesh, RecastMeshContent};
use crate::recast_mesh_manager::{ChangeType, ChangedTile, TileCachedRecastMeshManager};
use crate::settings::{NavigatorSettings, RecastSettings};
use crate::stats::UpdaterStats;
use crate::tile_db::{TileDb, TileDbKey};
use crate::tile_position::{get_manhattan_distance, TilePosition};
use crate::tiles_cache::NavMeshTilesCache;
use crate::wait::{LoadingListener, WaitConditionType};
use navigator_common::{Error, Result};
use navmesh_grid::GridTile;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use web_time::Instant;

/// Longest a waiting thread sleeps before re-checking its condition
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

type JobKey = (AgentBounds, (i32, i32));

#[derive(Debug, Clone)]
struct Job {
    agent: AgentBounds,
    nav_mesh: WeakNavMeshCacheItem,
    worldspace: Arc<str>,
    tile: TilePosition,
    change_type: ChangeType,
    process_time: Instant,
}

impl Job {
    fn key(&self) -> JobKey {
        (self.agent, (self.tile.x, self.tile.y))
    }
}

#[derive(Default)]
struct QueueState {
    waiting: HashMap<JobKey, Job>,
    processing: HashSet<JobKey>,
    player_tile: TilePosition,
    pushed: u64,
    processed: u64,
    stopped: bool,
}

enum NextJob {
    Ready(Job),
    At(Instant),
    Empty,
}

impl QueueState {
    /// Removes the most urgent ready job and marks it as processing
    fn next_job(&mut self, now: Instant) -> NextJob {
        let player_tile = self.player_tile;
        let best = self
            .waiting
            .iter()
            .filter(|(key, _)| !self.processing.contains(*key))
            .min_by_key(|(_, job)| {
                (
                    job.process_time.max(now),
                    job.change_type,
                    get_manhattan_distance(job.tile, player_tile),
                    (job.tile.x, job.tile.y),
                )
            })
            .map(|(key, job)| (*key, job.process_time));

        match best {
            None => NextJob::Empty,
            Some((_, at)) if at > now => NextJob::At(at),
            Some((key, _)) => match self.waiting.remove(&key) {
                Some(job) => {
                    self.processing.insert(key);
                    NextJob::Ready(job)
                }
                None => NextJob::Empty,
            },
        }
    }

    fn remaining(&self, condition: WaitConditionType, min_distance: i32) -> usize {
        match condition {
            WaitConditionType::AllJobsDone => self.waiting.len() + self.processing.len(),
            WaitConditionType::RequiredTilesPresent => {
                let near = |&(x, y): &(i32, i32)| {
                    get_manhattan_distance(TilePosition::new(x, y), self.player_tile) <= min_distance as i64
                };
                self.waiting.keys().filter(|(_, t)| near(t)).count()
                    + self.processing.iter().filter(|(_, t)| near(t)).count()
            }
        }
    }
}

struct Shared {
    settings: NavigatorSettings,
    manager: Arc<TileCachedRecastMeshManager>,
    generator: Arc<dyn TileGenerator>,
    tiles_cache: NavMeshTilesCache,
    db: Option<TileDb>,
    queue: Mutex<QueueState>,
    has_job: Condvar,
    done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, job: &Job) {
        let mut queue = self.lock();
        queue.processing.remove(&job.key());
        queue.processed += 1;
        drop(queue);
        self.done.notify_all();
        self.has_job.notify_all();
    }

    fn run_worker(&self) {
        loop {
            let job = {
                let mut queue = self.lock();
                loop {
                    if queue.stopped {
                        return;
                    }
                    match queue.next_job(Instant::now()) {
                        NextJob::Ready(job) => break job,
                        NextJob::At(at) => {
                            let timeout = at.saturating_duration_since(Instant::now());
                            queue = self
                                .has_job
                                .wait_timeout(queue, timeout)
                                .unwrap_or_else(PoisonError::into_inner)
                                .0;
                        }
                        NextJob::Empty => {
                            queue = self.has_job.wait(queue).unwrap_or_else(PoisonError::into_inner);
                        }
                    }
                }
            };
            self.run_job(&job);
        }
    }

    /// Processes a job and always marks it finished, even when tile generation panics
    fn run_job(&self, job: &Job) {
        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| self.process_job(job))) {
            let message = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("unknown panic");
            log::error!(
                "Navmesh job for agent {} tile ({}, {}) failed with a panic: {message}",
                job.agent,
                job.tile.x,
                job.tile.y
            );
        }
        self.finish(job);
    }

    fn process_job(&self, job: &Job) -> UpdateNavMeshStatus {
        let Some(nav_mesh) = job.nav_mesh.upgrade() else {
            log::debug!(
                "Dropping navmesh job for removed agent {} tile ({}, {})",
                job.agent,
                job.tile.x,
                job.tile.y
            );
            return UpdateNavMeshStatus::Ignored;
        };

        let start = Instant::now();
        let status = self.update_tile(job, &nav_mesh);
        log::debug!(
            "Processed navmesh job agent={} tile=({}, {}) change={:?} status={:?} in {:?}",
            job.agent,
            job.tile.x,
            job.tile.y,
            job.change_type,
            status,
            start.elapsed()
        );
        status
    }

    fn update_tile(&self, job: &Job, nav_mesh: &SharedNavMeshCacheItem) -> UpdateNavMeshStatus {
        if !self.manager.active_tiles().contains(job.tile) {
            return nav_mesh.lock().remove_tile(job.tile);
        }
        let Some(mesh) = self.manager.get_mesh(job.tile) else {
            return nav_mesh.lock().remove_tile(job.tile);
        };

        if self.settings.enable_write_recast_mesh_to_file {
            if let Err(e) = write_recast_mesh_obj(
                &self.settings.recast,
                &self.settings.recast_mesh_path_prefix,
                job.tile,
                &mesh,
            ) {
                log::warn!("Failed to write recast mesh of tile ({}, {}): {e}", job.tile.x, job.tile.y);
            }
        }

        match self.get_or_generate(job, &mesh) {
            Ok(Some(tile)) => nav_mesh.lock().update_tile(job.tile, tile),
            Ok(None) => nav_mesh.lock().remove_tile(job.tile),
            Err(e) => {
                log::warn!(
                    "Failed to generate tile ({}, {}) for agent {}: {e}",
                    job.tile.x,
                    job.tile.y,
                    job.agent
                );
                nav_mesh.lock().remove_tile(job.tile);
                UpdateNavMeshStatus::Failed
            }
        }
    }

    /// Looks the tile up in memory, then on disk, and generates it on a miss
    fn get_or_generate(&self, job: &Job, mesh: &RecastMesh) -> Result<Option<Arc<GridTile>>> {
        let recast = &self.settings.recast;
        let input = make_tile_input_key(&job.agent, job.tile, recast, mesh)?;
        if let Some(tile) = self.tiles_cache.get(&input) {
            return Ok(Some(tile));
        }

        let agent_key = make_agent_key(&job.agent, recast)?;
        let db_key = TileDbKey {
            agent: agent_key,
            worldspace: &job.worldspace,
            tile: job.tile,
            input: &input,
        };
        if let Some(tile) = self.db.as_ref().and_then(|db| db.get(&db_key)) {
            self.tiles_cache.set(input, tile.clone());
            return Ok(Some(tile));
        }

        let Some(tile) = self.generator.generate(&job.agent, recast, job.tile, mesh)? else {
            return Ok(None);
        };
        let tile = Arc::new(tile);
        if self.settings.write_to_nav_mesh_db {
            if let Some(db) = &self.db {
                db.put(&db_key, &tile);
            }
        }
        self.tiles_cache.set(input, tile.clone());
        Ok(Some(tile))
    }
}

/// Serialized generation input of a tile, used as cache key
pub(crate) fn make_tile_input_key(
    agent: &AgentBounds,
    tile: TilePosition,
    settings: &RecastSettings,
    mesh: &RecastMesh,
) -> Result<Vec<u8>> {
    postcard::to_allocvec(&(agent, tile, settings, RecastMeshContent::from(mesh)))
        .map_err(|e| Error::Serialization(e.to_string()))
}

fn make_agent_key(agent: &AgentBounds, settings: &RecastSettings) -> Result<u32> {
    let bytes = postcard::to_allocvec(&(agent, settings)).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(crc32fast::hash(&bytes))
}

/// Worker pool rebuilding changed tiles
pub struct AsyncNavMeshUpdater {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl AsyncNavMeshUpdater {
    pub fn new(
        settings: NavigatorSettings,
        manager: Arc<TileCachedRecastMeshManager>,
        generator: Arc<dyn TileGenerator>,
        db: Option<TileDb>,
    ) -> Self {
        let thread_count = settings.async_nav_mesh_updater_threads;
        let shared = Arc::new(Shared {
            tiles_cache: NavMeshTilesCache::new(settings.max_nav_mesh_tiles_cache_size),
            settings,
            manager,
            generator,
            db,
            queue: Mutex::new(QueueState::default()),
            has_job: Condvar::new(),
            done: Condvar::new(),
        });

        let mut threads = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let worker = shared.clone();
            match std::thread::Builder::new()
                .name(format!("navmesh-updater-{i}"))
                .spawn(move || worker.run_worker())
            {
                Ok(handle) => threads.push(handle),
                Err(e) => log::error!("Failed to start navmesh updater thread: {e}"),
            }
        }
        log::info!("Started navmesh updater with {} threads", threads.len());

        Self { shared, threads }
    }

    /// Queues one job per changed tile
    pub fn post(
        &self,
        agent: AgentBounds,
        nav_mesh: &SharedNavMeshCacheItem,
        player_tile: TilePosition,
        worldspace: &str,
        changed_tiles: &[(TilePosition, ChangedTile)],
    ) {
        let now = Instant::now();
        let worldspace: Arc<str> = Arc::from(worldspace);
        let weak = nav_mesh.downgrade();
        let mut queue = self.shared.lock();
        queue.player_tile = player_tile;
        for (tile, changed) in changed_tiles {
            let process_time = changed.not_before.map_or(now, |t| t.max(now));
            let job = Job {
                agent,
                nav_mesh: weak.clone(),
                worldspace: worldspace.clone(),
                tile: *tile,
                change_type: changed.change_type,
                process_time,
            };
            queue.pushed += 1;
            match queue.waiting.get_mut(&job.key()) {
                Some(existing) => {
                    existing.change_type = existing.change_type.merge(job.change_type);
                    existing.process_time = existing.process_time.min(job.process_time);
                    existing.worldspace = job.worldspace;
                    existing.nav_mesh = job.nav_mesh;
                }
                None => {
                    queue.waiting.insert(job.key(), job);
                }
            }
        }
        drop(queue);
        self.shared.has_job.notify_all();
    }

    /// Blocks until `condition` holds; false when the listener stops the wait
    pub fn wait(&self, condition: WaitConditionType, mut listener: Option<&mut dyn LoadingListener>) -> bool {
        let min_distance = self.shared.settings.wait_until_min_distance_to_player;
        let initial = self.shared.lock().remaining(condition, min_distance);
        if let Some(listener) = listener.as_deref_mut() {
            listener.set_label("Building navigation mesh");
            listener.set_progress_range(initial);
        }

        loop {
            let mut queue = self.shared.lock();
            let remaining = queue.remaining(condition, min_distance);
            if let Some(listener) = listener.as_deref_mut() {
                listener.set_progress(initial.saturating_sub(remaining));
            }
            if remaining == 0 {
                return true;
            }
            if let Some(listener) = listener.as_deref_mut() {
                if !listener.keep_waiting() {
                    return false;
                }
            }

            if !self.threads.is_empty() {
                drop(
                    self.shared
                        .done
                        .wait_timeout(queue, WAIT_POLL_INTERVAL)
                        .unwrap_or_else(PoisonError::into_inner),
                );
                continue;
            }

            match queue.next_job(Instant::now()) {
                NextJob::Ready(job) => {
                    drop(queue);
                    self.shared.run_job(&job);
                }
                NextJob::At(at) => {
                    drop(queue);
                    std::thread::sleep(at.saturating_duration_since(Instant::now()).min(WAIT_POLL_INTERVAL));
                }
                NextJob::Empty => return true,
            }
        }
    }

    pub fn stats(&self) -> UpdaterStats {
        let queue = self.shared.lock();
        UpdaterStats {
            jobs: queue.waiting.len() + queue.processing.len(),
            waiting: queue.waiting.len(),
            processing: queue.processing.len(),
            pushed: queue.pushed,
            processed: queue.processed,
            tiles_cache: self.shared.tiles_cache.stats(),
            db: self.shared.db.as_ref().map(TileDb::stats),
        }
    }

    /// Stops the workers; waiting jobs are dropped
    pub fn stop(&mut self) {
        {
            let mut queue = self.shared.lock();
            queue.stopped = true;
            queue.waiting.clear();
        }
        self.shared.has_job.notify_all();
        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                log::error!("Navmesh updater thread panicked");
            }
        }
        log::info!("Stopped navmesh updater");
    }
}

impl Drop for AsyncNavMeshUpdater {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.stop();
        }
    }
}
