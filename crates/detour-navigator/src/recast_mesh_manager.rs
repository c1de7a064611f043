//! Tracked geometry, dirty tiles and per-tile RecastMesh builds

use crate::area_type::AreaType;
use crate::extractor::world_aabb;
use crate::recast_mesh::{RecastMesh, Version, Water};
use crate::recast_mesh_builder::RecastMeshBuilder;
use crate::settings::RecastSettings;
use crate::shapes::{HeightfieldShape, ObjectShapes};
use crate::tile_position::{
    make_real_tile_bounds_with_border, make_tiles_positions_range, ActiveTiles, TilePosition,
    TilesPositionsRange,
};
use glam::{Affine3A, IVec2, Vec2};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use web_time::Instant;

/// Identity of a tracked object, chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// What happened to a tile; ordered by processing priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeType {
    Remove,
    Mixed,
    Add,
    Update,
}

impl ChangeType {
    pub fn merge(self, other: ChangeType) -> ChangeType {
        if self == other {
            self
        } else {
            ChangeType::Mixed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangedTile {
    pub change_type: ChangeType,
    /// Earliest time the tile may be rebuilt, `None` for immediately
    pub not_before: Option<Instant>,
}

impl ChangedTile {
    fn merge(&mut self, change_type: ChangeType, not_before: Option<Instant>) {
        self.change_type = self.change_type.merge(change_type);
        self.not_before = match (self.not_before, not_before) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
    }
}

struct ObjectData {
    shapes: ObjectShapes,
    child_transforms: Vec<Affine3A>,
    range: TilesPositionsRange,
    last_update: Option<Instant>,
}

struct HeightfieldData {
    cell_size: i32,
    shape: HeightfieldShape,
    range: TilesPositionsRange,
}

struct WaterData {
    water: Water,
    range: TilesPositionsRange,
}

type CellKey = (i32, i32);

fn cell_key(p: IVec2) -> CellKey {
    (p.x, p.y)
}

/// Mutable manager state, reachable through the manager lock or an [`UpdateGuard`]
pub struct ManagerState {
    active: ActiveTiles,
    worldspace: String,
    objects: BTreeMap<ObjectId, ObjectData>,
    heightfields: BTreeMap<CellKey, HeightfieldData>,
    water: BTreeMap<CellKey, WaterData>,
    generation: u64,
    revision: u64,
    changed_tiles: BTreeMap<CellKey, ChangedTile>,
    meshes: HashMap<TilePosition, Option<Arc<RecastMesh>>>,
}

impl ManagerState {
    fn mark_range(&mut self, range: TilesPositionsRange, change_type: ChangeType, not_before: Option<Instant>) {
        let limited = range.intersection(&self.active.range);
        for tile in limited.iter() {
            if self.active.contains(tile) {
                self.mark_tile(tile, change_type, not_before);
            }
        }
    }

    fn mark_tile(&mut self, tile: TilePosition, change_type: ChangeType, not_before: Option<Instant>) {
        self.meshes.remove(&tile);
        self.changed_tiles
            .entry(cell_key(tile))
            .and_modify(|c| c.merge(change_type, not_before))
            .or_insert(ChangedTile {
                change_type,
                not_before,
            });
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
    }
}

/// Holds the manager lock so a batch of changes is applied at once
pub struct UpdateGuard<'a> {
    state: MutexGuard<'a, ManagerState>,
}

/// Tracks objects, terrain and water and builds one RecastMesh per tile
pub struct TileCachedRecastMeshManager {
    settings: RecastSettings,
    min_update_interval: Duration,
    state: Mutex<ManagerState>,
}

impl TileCachedRecastMeshManager {
    pub fn new(settings: RecastSettings, min_update_interval: Duration) -> Self {
        Self {
            settings,
            min_update_interval,
            state: Mutex::new(ManagerState {
                active: ActiveTiles::default(),
                worldspace: String::new(),
                objects: BTreeMap::new(),
                heightfields: BTreeMap::new(),
                water: BTreeMap::new(),
                generation: 0,
                revision: 0,
                changed_tiles: BTreeMap::new(),
                meshes: HashMap::new(),
            }),
        }
    }

    pub fn settings(&self) -> &RecastSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn make_update_guard(&self) -> UpdateGuard<'_> {
        UpdateGuard { state: self.lock() }
    }

    fn with_state<R>(&self, guard: Option<&mut UpdateGuard<'_>>, f: impl FnOnce(&mut ManagerState) -> R) -> R {
        match guard {
            Some(guard) => f(&mut guard.state),
            None => f(&mut self.lock()),
        }
    }

    fn cell_range(&self, cell_position: IVec2, cell_size: i32) -> TilesPositionsRange {
        let min = cell_position.as_vec2() * cell_size as f32;
        make_tiles_positions_range(&self.settings, min, min + Vec2::splat(cell_size as f32))
    }

    fn object_range(&self, shapes: &ObjectShapes) -> TilesPositionsRange {
        let transform = shapes.transform.to_affine();
        let main = world_aabb(&shapes.shape, &transform);
        let avoid = shapes.avoid.as_ref().and_then(|a| world_aabb(a, &transform));
        let aabb = match (main, avoid) {
            (Some(a), Some(b)) => Some((a.0.min(b.0), a.1.max(b.1))),
            (a, b) => a.or(b),
        };
        match aabb {
            Some((min, max)) => make_tiles_positions_range(&self.settings, min.truncate(), max.truncate()),
            None => TilesPositionsRange::default(),
        }
    }

    /// Starts tracking an object; false when the id is already tracked
    pub fn add_object(&self, id: ObjectId, shapes: ObjectShapes, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        let range = self.object_range(&shapes);
        self.with_state(guard, |state| {
            if state.objects.contains_key(&id) {
                return false;
            }
            let child_transforms = shapes.mutable_child_transforms();
            state.objects.insert(
                id,
                ObjectData {
                    shapes,
                    child_transforms,
                    range,
                    last_update: Some(Instant::now()),
                },
            );
            state.mark_range(range, ChangeType::Add, None);
            state.bump_revision();
            true
        })
    }

    /// Replaces the shapes or placement of a tracked object.
    ///
    /// Returns false for unknown objects and for updates that change nothing.
    /// Changes closer than the minimum update interval to the previous one are
    /// scheduled for the end of that interval.
    pub fn update_object(&self, id: ObjectId, shapes: ObjectShapes, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        let new_range = self.object_range(&shapes);
        let child_transforms = shapes.mutable_child_transforms();
        let interval = self.min_update_interval;
        self.with_state(guard, |state| {
            let Some(data) = state.objects.get_mut(&id) else {
                return false;
            };
            if data.shapes.same_as(&shapes) && data.child_transforms == child_transforms {
                return false;
            }

            let now = Instant::now();
            let not_before = match data.last_update {
                Some(last) if now < last + interval => Some(last + interval),
                _ => {
                    data.last_update = Some(now);
                    None
                }
            };
            let old_range = data.range;
            data.shapes = shapes;
            data.child_transforms = child_transforms;
            data.range = new_range;

            state.mark_range(old_range, ChangeType::Update, not_before);
            state.mark_range(new_range, ChangeType::Update, not_before);
            state.bump_revision();
            true
        })
    }

    pub fn remove_object(&self, id: ObjectId, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.with_state(guard, |state| {
            let Some(data) = state.objects.remove(&id) else {
                return false;
            };
            state.mark_range(data.range, ChangeType::Remove, None);
            state.bump_revision();
            true
        })
    }

    /// Adds terrain for a cell; false when the cell already has terrain
    pub fn add_heightfield(
        &self,
        cell_position: IVec2,
        cell_size: i32,
        shape: HeightfieldShape,
        guard: Option<&mut UpdateGuard<'_>>,
    ) -> bool {
        let range = self.cell_range(cell_position, cell_size);
        self.with_state(guard, |state| {
            let key = cell_key(cell_position);
            if state.heightfields.contains_key(&key) {
                return false;
            }
            state.heightfields.insert(
                key,
                HeightfieldData {
                    cell_size,
                    shape,
                    range,
                },
            );
            state.mark_range(range, ChangeType::Add, None);
            state.bump_revision();
            true
        })
    }

    pub fn remove_heightfield(&self, cell_position: IVec2, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.with_state(guard, |state| {
            let Some(data) = state.heightfields.remove(&cell_key(cell_position)) else {
                return false;
            };
            state.mark_range(data.range, ChangeType::Remove, None);
            state.bump_revision();
            true
        })
    }

    /// Adds water for a cell; the first water of a cell wins
    pub fn add_water(&self, cell_position: IVec2, water: Water, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        let range = if water.is_infinite() {
            TilesPositionsRange::new(IVec2::splat(i32::MIN), IVec2::splat(i32::MAX))
        } else {
            self.cell_range(cell_position, water.cell_size)
        };
        self.with_state(guard, |state| {
            let key = cell_key(cell_position);
            if state.water.contains_key(&key) {
                return false;
            }
            state.water.insert(key, WaterData { water, range });
            state.mark_range(range, ChangeType::Add, None);
            state.bump_revision();
            true
        })
    }

    pub fn remove_water(&self, cell_position: IVec2, guard: Option<&mut UpdateGuard<'_>>) -> bool {
        self.with_state(guard, |state| {
            let Some(data) = state.water.remove(&cell_key(cell_position)) else {
                return false;
            };
            state.mark_range(data.range, ChangeType::Remove, None);
            state.bump_revision();
            true
        })
    }

    /// Moves the active tile set; tiles entering it are added, tiles leaving it removed
    pub fn set_active_tiles(&self, active: ActiveTiles, guard: Option<&mut UpdateGuard<'_>>) {
        self.with_state(guard, |state| {
            if state.active == active {
                return;
            }
            let old = state.active;
            state.active = active;
            let mut changed = false;
            for tile in old.iter().filter(|t| !active.contains(*t)) {
                state.meshes.remove(&tile);
                state
                    .changed_tiles
                    .entry(cell_key(tile))
                    .and_modify(|c| c.merge(ChangeType::Remove, None))
                    .or_insert(ChangedTile {
                        change_type: ChangeType::Remove,
                        not_before: None,
                    });
                changed = true;
            }
            for tile in active.iter().filter(|t| !old.contains(*t)) {
                state.mark_tile(tile, ChangeType::Add, None);
                changed = true;
            }
            if changed {
                state.bump_revision();
            }
        })
    }

    pub fn active_tiles(&self) -> ActiveTiles {
        self.lock().active
    }

    /// Switches the worldspace; every active tile is rebuilt
    pub fn set_worldspace(&self, worldspace: &str, guard: Option<&mut UpdateGuard<'_>>) {
        self.with_state(guard, |state| {
            if state.worldspace == worldspace {
                return;
            }
            state.worldspace = worldspace.to_string();
            state.generation += 1;
            state.revision = 0;
            state.meshes.clear();
            let active = state.active;
            for tile in active.iter() {
                state.mark_tile(tile, ChangeType::Mixed, None);
            }
        })
    }

    pub fn worldspace(&self) -> String {
        self.lock().worldspace.clone()
    }

    pub fn version(&self) -> Version {
        let state = self.lock();
        Version::new(state.generation, state.revision)
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Takes the tiles changed since the previous call
    pub fn take_changed_tiles(&self, guard: Option<&mut UpdateGuard<'_>>) -> Vec<(TilePosition, ChangedTile)> {
        self.with_state(guard, |state| {
            std::mem::take(&mut state.changed_tiles)
                .into_iter()
                .map(|((x, y), changed)| (IVec2::new(x, y), changed))
                .collect()
        })
    }

    /// Active tiles overlapped by any tracked geometry
    pub fn objects_range(&self) -> TilesPositionsRange {
        let state = self.lock();
        let ranges = state
            .objects
            .values()
            .map(|o| o.range)
            .chain(state.heightfields.values().map(|h| h.range))
            .chain(state.water.values().map(|w| w.range))
            .filter(|r| !r.is_empty());
        let union = ranges.reduce(|a, b| TilesPositionsRange::new(a.begin.min(b.begin), a.end.max(b.end)));
        union.map_or_else(TilesPositionsRange::default, |r| r.intersection(&state.active.range))
    }

    /// RecastMesh of an active tile, `None` when nothing overlaps it
    pub fn get_mesh(&self, tile: TilePosition) -> Option<Arc<RecastMesh>> {
        let mut state = self.lock();
        if !state.active.contains(tile) {
            return None;
        }
        if let Some(cached) = state.meshes.get(&tile) {
            return cached.clone();
        }
        let mesh = self.build_mesh(&state, tile).map(Arc::new);
        state.meshes.insert(tile, mesh.clone());
        mesh
    }

    fn build_mesh(&self, state: &ManagerState, tile: TilePosition) -> Option<RecastMesh> {
        let mut builder = RecastMeshBuilder::new(make_real_tile_bounds_with_border(&self.settings, tile));

        for data in state.objects.values().filter(|o| o.range.contains(tile)) {
            let transform = data.shapes.transform.to_affine();
            builder.add_object(&data.shapes.shape, &transform, AreaType::Ground);
            if let Some(avoid) = &data.shapes.avoid {
                builder.add_object(avoid, &transform, AreaType::Null);
            }
        }

        for (&(x, y), data) in state.heightfields.iter().filter(|(_, h)| h.range.contains(tile)) {
            let cell_position = IVec2::new(x, y);
            match &data.shape {
                HeightfieldShape::Plane { height } => {
                    builder.add_flat_heightfield(cell_position, data.cell_size, *height)
                }
                HeightfieldShape::Surface {
                    heights,
                    size,
                    min_height,
                    max_height,
                } => builder.add_heightfield(
                    cell_position,
                    data.cell_size,
                    heights,
                    *size,
                    *min_height,
                    *max_height,
                ),
            }
        }

        for (&(x, y), data) in state.water.iter().filter(|(_, w)| w.range.contains(tile)) {
            builder.add_water(IVec2::new(x, y), data.water);
        }

        let mesh = builder.create(Version::new(state.generation, state.revision));
        (!mesh.is_empty()).then_some(mesh)
    }

    /// Non-empty RecastMeshes of every active tile
    pub fn get_recast_mesh_tiles(&self) -> Vec<(TilePosition, Arc<RecastMesh>)> {
        let range = self.objects_range();
        let active = self.active_tiles();
        range
            .iter()
            .filter(|t| active.contains(*t))
            .filter_map(|t| self.get_mesh(t).map(|mesh| (t, mesh)))
            .collect()
    }
}
