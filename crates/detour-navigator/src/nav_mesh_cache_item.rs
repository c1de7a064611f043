//! Published navmesh of one agent

use crate::recast_mesh::Version;
use crate::tile_position::TilePosition;
use navmesh_grid::{GridTile, TileSource};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

/// Outcome of publishing one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateNavMeshStatus {
    /// Same payload as the published one, nothing changed
    Ignored,
    Added,
    Replaced,
    Removed,
    /// Generation failed; any previous payload was removed
    Failed,
}

impl UpdateNavMeshStatus {
    pub fn is_change(self) -> bool {
        matches!(
            self,
            UpdateNavMeshStatus::Added | UpdateNavMeshStatus::Replaced | UpdateNavMeshStatus::Removed
        )
    }
}

#[derive(Debug, Clone)]
struct PublishedTile {
    tile: Arc<GridTile>,
    version: u64,
}

/// Tiles of one navmesh with a version bumped on every published change
#[derive(Debug, Default)]
pub struct NavMeshCacheItem {
    generation: u64,
    revision: u64,
    tiles: HashMap<TilePosition, PublishedTile>,
}

impl NavMeshCacheItem {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    pub fn version(&self) -> Version {
        Version::new(self.generation, self.revision)
    }

    /// Version of a published tile
    pub fn tile_version(&self, position: TilePosition) -> Option<u64> {
        self.tiles.get(&position).map(|t| t.version)
    }

    pub fn has_tile(&self, position: TilePosition) -> bool {
        self.tiles.contains_key(&position)
    }

    pub fn used_tiles(&self) -> impl Iterator<Item = (TilePosition, &Arc<GridTile>)> {
        self.tiles.iter().map(|(p, t)| (*p, &t.tile))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Publishes a tile, replacing whatever was there
    pub fn update_tile(&mut self, position: TilePosition, tile: Arc<GridTile>) -> UpdateNavMeshStatus {
        let status = match self.tiles.get(&position) {
            Some(existing) if Arc::ptr_eq(&existing.tile, &tile) || *existing.tile == *tile => {
                return UpdateNavMeshStatus::Ignored;
            }
            Some(_) => UpdateNavMeshStatus::Replaced,
            None => UpdateNavMeshStatus::Added,
        };
        // Tile versions come from the item revision so a re-added tile never goes back
        self.revision += 1;
        let version = self.revision;
        self.tiles.insert(position, PublishedTile { tile, version });
        status
    }

    /// Drops every tile for a new generation; the revision keeps counting
    pub fn reset(&mut self, generation: u64) {
        self.generation = generation;
        self.tiles.clear();
        self.revision += 1;
    }

    pub fn remove_tile(&mut self, position: TilePosition) -> UpdateNavMeshStatus {
        if self.tiles.remove(&position).is_none() {
            return UpdateNavMeshStatus::Ignored;
        }
        self.revision += 1;
        UpdateNavMeshStatus::Removed
    }
}

impl TileSource for NavMeshCacheItem {
    fn tile(&self, position: glam::IVec2) -> Option<&GridTile> {
        self.tiles.get(&position).map(|t| t.tile.as_ref())
    }

    fn tile_positions(&self) -> Box<dyn Iterator<Item = glam::IVec2> + '_> {
        Box::new(self.tiles.keys().copied())
    }

    fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

/// Lockable handle to a navmesh shared between the navigator and the updater
#[derive(Debug, Clone, Default)]
pub struct SharedNavMeshCacheItem(Arc<RwLock<NavMeshCacheItem>>);

impl SharedNavMeshCacheItem {
    pub fn new(item: NavMeshCacheItem) -> Self {
        Self(Arc::new(RwLock::new(item)))
    }

    pub fn lock_const(&self) -> RwLockReadGuard<'_, NavMeshCacheItem> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, NavMeshCacheItem> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakNavMeshCacheItem {
        WeakNavMeshCacheItem(Arc::downgrade(&self.0))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct WeakNavMeshCacheItem(Weak<RwLock<NavMeshCacheItem>>);

impl WeakNavMeshCacheItem {
    pub fn upgrade(&self) -> Option<SharedNavMeshCacheItem> {
        self.0.upgrade().map(SharedNavMeshCacheItem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;
    use navmesh_grid::{GridNode, NodeFlags};

    fn tile(height: f32) -> Arc<GridTile> {
        let node = GridNode {
            height,
            area: 63,
            flags: NodeFlags::WALK,
        };
        Arc::new(GridTile::from_columns(IVec2::ZERO, 1, 1.0, vec![vec![node]]).unwrap())
    }

    #[test]
    fn test_identical_tile_is_ignored() {
        let mut item = NavMeshCacheItem::new(0);
        assert_eq!(item.update_tile(IVec2::ZERO, tile(1.0)), UpdateNavMeshStatus::Added);
        let version = item.version();
        assert_eq!(item.update_tile(IVec2::ZERO, tile(1.0)), UpdateNavMeshStatus::Ignored);
        assert_eq!(item.version(), version);
        assert_eq!(item.update_tile(IVec2::ZERO, tile(2.0)), UpdateNavMeshStatus::Replaced);
        assert!(item.version() > version);
        assert_eq!(item.tile_version(IVec2::ZERO), Some(2));
    }

    #[test]
    fn test_remove_tile() {
        let mut item = NavMeshCacheItem::new(0);
        assert_eq!(item.remove_tile(IVec2::ZERO), UpdateNavMeshStatus::Ignored);
        item.update_tile(IVec2::ZERO, tile(1.0));
        assert_eq!(item.remove_tile(IVec2::ZERO), UpdateNavMeshStatus::Removed);
        assert_eq!(item.tile_count(), 0);
        assert_eq!(item.version(), Version::new(0, 2));
    }

    #[test]
    fn test_tile_version_keeps_growing_after_remove() {
        let mut item = NavMeshCacheItem::new(0);
        let other = IVec2::new(1, 0);
        item.update_tile(IVec2::ZERO, tile(1.0));
        item.update_tile(IVec2::ZERO, tile(2.0));
        item.update_tile(IVec2::ZERO, tile(3.0));
        item.update_tile(other, tile(1.0));
        let before = item.tile_version(IVec2::ZERO).unwrap();
        assert_eq!(before, 3);

        item.remove_tile(IVec2::ZERO);
        assert_eq!(item.tile_version(IVec2::ZERO), None);
        assert_eq!(item.update_tile(IVec2::ZERO, tile(1.0)), UpdateNavMeshStatus::Added);
        let after = item.tile_version(IVec2::ZERO).unwrap();
        assert!(after > before);
        assert!(after > item.tile_version(other).unwrap());

        item.reset(1);
        assert_eq!(item.tile_count(), 0);
        assert_eq!(item.version().generation, 1);
        item.update_tile(IVec2::ZERO, tile(1.0));
        assert!(item.tile_version(IVec2::ZERO).unwrap() > after);
    }

    #[test]
    fn test_weak_handle_expires() {
        let shared = SharedNavMeshCacheItem::new(NavMeshCacheItem::new(0));
        let weak = shared.downgrade();
        assert!(weak.upgrade().is_some());
        drop(shared);
        assert!(weak.upgrade().is_none());
    }
}
