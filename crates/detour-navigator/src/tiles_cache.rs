//! In-memory cache of generated tiles, evicting the least recently used

use navmesh_grid::GridTile;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TilesCacheStats {
    pub entries: usize,
    pub used_size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub get_count: u64,
}

struct Entry {
    tile: Arc<GridTile>,
    size: usize,
    tick: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<Vec<u8>, Entry>,
    /// Keys by last use
    recent: BTreeMap<u64, Vec<u8>>,
    used_size: usize,
    tick: u64,
    hits: u64,
    get_count: u64,
}

impl CacheState {
    fn touch(&mut self, key: &[u8]) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recent.remove(&entry.tick);
            entry.tick = tick;
            self.recent.insert(tick, key.to_vec());
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.recent.pop_first() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.used_size -= entry.size;
        }
        true
    }
}

/// Tiles keyed by the serialized generation input, bounded by total byte size
pub struct NavMeshTilesCache {
    max_size: usize,
    state: Mutex<CacheState>,
}

impl NavMeshTilesCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Arc<GridTile>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.get_count += 1;
        let tile = state.entries.get(key).map(|e| e.tile.clone())?;
        state.hits += 1;
        state.touch(key);
        Some(tile)
    }

    /// Stores a tile; tiles larger than the whole cache are not kept
    pub fn set(&self, key: Vec<u8>, tile: Arc<GridTile>) {
        let size = key.len() + tile.memory_size();
        if size > self.max_size {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = state.entries.remove(&key) {
            state.recent.remove(&old.tick);
            state.used_size -= old.size;
        }
        while state.used_size + size > self.max_size && state.evict_oldest() {}

        state.tick += 1;
        let tick = state.tick;
        state.recent.insert(tick, key.clone());
        state.entries.insert(key, Entry { tile, size, tick });
        state.used_size += size;
    }

    pub fn stats(&self) -> TilesCacheStats {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        TilesCacheStats {
            entries: state.entries.len(),
            used_size: state.used_size,
            max_size: self.max_size,
            hits: state.hits,
            get_count: state.get_count,
        }
    }
}
