//! Tile addressing and tile bounds

use crate::settings::RecastSettings;
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Integer grid coordinate of a tile
pub type TilePosition = IVec2;

/// Axis-aligned rectangle in world X/Y
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl TileBounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Overlap test; touching edges count as overlapping
    pub fn intersects(&self, other: &TileBounds) -> bool {
        navigator_common::overlap_bounds_2d(self.min, self.max, other.min, other.max)
    }

    pub fn intersection(&self, other: &TileBounds) -> Option<TileBounds> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min.x <= max.x && min.y <= max.y).then_some(TileBounds { min, max })
    }

    pub fn expanded(&self, distance: f32) -> TileBounds {
        TileBounds {
            min: self.min - Vec2::splat(distance),
            max: self.max + Vec2::splat(distance),
        }
    }
}

/// Tile containing a world position
pub fn get_tile_position(settings: &RecastSettings, position: Vec2) -> TilePosition {
    (position / settings.tile_world_size()).floor().as_ivec2()
}

/// World rectangle covered by a tile, border excluded
pub fn make_tile_bounds(settings: &RecastSettings, tile: TilePosition) -> TileBounds {
    let size = settings.tile_world_size();
    TileBounds {
        min: tile.as_vec2() * size,
        max: (tile + IVec2::ONE).as_vec2() * size,
    }
}

/// World rectangle rasterized for a tile, border included
pub fn make_real_tile_bounds_with_border(settings: &RecastSettings, tile: TilePosition) -> TileBounds {
    make_tile_bounds(settings, tile).expanded(settings.border_world_size())
}

/// Half-open rectangle of tile positions `[begin, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TilesPositionsRange {
    pub begin: TilePosition,
    pub end: TilePosition,
}

impl TilesPositionsRange {
    pub fn new(begin: TilePosition, end: TilePosition) -> Self {
        Self { begin, end }
    }

    pub fn is_empty(&self) -> bool {
        self.begin.x >= self.end.x || self.begin.y >= self.end.y
    }

    pub fn contains(&self, tile: TilePosition) -> bool {
        tile.x >= self.begin.x && tile.x < self.end.x && tile.y >= self.begin.y && tile.y < self.end.y
    }

    pub fn intersection(&self, other: &TilesPositionsRange) -> TilesPositionsRange {
        TilesPositionsRange {
            begin: self.begin.max(other.begin),
            end: self.end.min(other.end),
        }
    }

    /// Number of tiles, saturating for ranges larger than `u64`
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let width = (self.end.x as i64 - self.begin.x as i64) as u64;
        let height = (self.end.y as i64 - self.begin.y as i64) as u64;
        width.saturating_mul(height)
    }

    /// Row-major iteration; call on bounded ranges only
    pub fn iter(&self) -> impl Iterator<Item = TilePosition> {
        let range = *self;
        let rows = if range.is_empty() { 0..0 } else { range.begin.y..range.end.y };
        rows.flat_map(move |y| (range.begin.x..range.end.x).map(move |x| IVec2::new(x, y)))
    }
}

/// Tiles whose bordered bounds overlap the world rectangle `[min, max]`
pub fn make_tiles_positions_range(settings: &RecastSettings, min: Vec2, max: Vec2) -> TilesPositionsRange {
    let border = settings.border_world_size();
    let begin = get_tile_position(settings, min - Vec2::splat(border));
    let last = get_tile_position(settings, max + Vec2::splat(border));
    TilesPositionsRange {
        begin,
        end: IVec2::new(last.x.saturating_add(1), last.y.saturating_add(1)),
    }
}

/// Manhattan distance between two tiles
pub fn get_manhattan_distance(a: TilePosition, b: TilePosition) -> i64 {
    (a.x as i64 - b.x as i64).abs() + (a.y as i64 - b.y as i64).abs()
}

/// Tiles kept around the player: a lattice disk inside a square range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActiveTiles {
    pub center: TilePosition,
    pub radius_sqr: i64,
    pub range: TilesPositionsRange,
}

impl ActiveTiles {
    /// The largest disk around `center` holding at most `max_tiles` tiles
    pub fn new(center: TilePosition, max_tiles: usize) -> Self {
        let radius_sqr = max_radius_sqr(max_tiles);
        let radius = (radius_sqr as f64).sqrt().floor() as i32;
        Self {
            center,
            radius_sqr,
            range: TilesPositionsRange {
                begin: center - IVec2::splat(radius),
                end: center + IVec2::splat(radius + 1),
            },
        }
    }

    pub fn contains(&self, tile: TilePosition) -> bool {
        if !self.range.contains(tile) {
            return false;
        }
        let d = tile - self.center;
        (d.x as i64).pow(2) + (d.y as i64).pow(2) <= self.radius_sqr
    }

    pub fn iter(&self) -> impl Iterator<Item = TilePosition> + '_ {
        self.range.iter().filter(move |t| self.contains(*t))
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

/// Number of lattice points inside the disk of squared radius `r2`
fn lattice_points(r2: i64) -> usize {
    let r = (r2 as f64).sqrt().floor() as i64;
    let mut count = 0;
    for x in -r..=r {
        let rest = r2 - x * x;
        let h = (rest as f64).sqrt().floor() as i64;
        count += (2 * h + 1) as usize;
    }
    count
}

fn max_radius_sqr(max_tiles: usize) -> i64 {
    if max_tiles == 0 {
        return -1;
    }
    let mut r2 = 0;
    while lattice_points(r2 + 1) <= max_tiles {
        r2 += 1;
    }
    r2
}
