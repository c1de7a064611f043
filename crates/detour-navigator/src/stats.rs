//! Navigator statistics

use crate::tile_db::TileDbStats;
use crate::tiles_cache::TilesCacheStats;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterStats {
    /// Jobs waiting or being processed
    pub jobs: usize,
    pub waiting: usize,
    pub processing: usize,
    /// Jobs posted since start
    pub pushed: u64,
    pub processed: u64,
    pub tiles_cache: TilesCacheStats,
    pub db: Option<TileDbStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub updater: UpdaterStats,
    pub recast_mesh_manager_revision: u64,
    pub objects: usize,
    pub agents: usize,
}

impl Stats {
    pub fn log(&self) {
        let u = &self.updater;
        log::info!(
            "Navigator: {} agents, {} objects, recast mesh revision {}",
            self.agents,
            self.objects,
            self.recast_mesh_manager_revision
        );
        log::info!(
            "Updater: {} jobs ({} waiting, {} processing), {} pushed, {} processed",
            u.jobs,
            u.waiting,
            u.processing,
            u.pushed,
            u.processed
        );
        log::info!(
            "Tiles cache: {} entries, {}/{} bytes, {} hits of {} gets",
            u.tiles_cache.entries,
            u.tiles_cache.used_size,
            u.tiles_cache.max_size,
            u.tiles_cache.hits,
            u.tiles_cache.get_count
        );
        if let Some(db) = &u.db {
            log::info!(
                "Tile DB: {} hits of {} reads, {} writes, {} refused, {}/{} bytes",
                db.hits,
                db.reads,
                db.writes,
                db.refused_writes,
                db.used_size,
                db.max_size
            );
        }
    }
}
