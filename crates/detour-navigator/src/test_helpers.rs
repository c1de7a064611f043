//! Fixtures shared by the test modules

use crate::agent_bounds::{AgentBounds, CollisionShapeType};
use crate::area_type::{AreaCosts, Flags};
use crate::navigator::Navigator;
use crate::query::Status;
use crate::settings::{NavigatorSettings, RecastSettings};
use crate::shapes::HeightfieldShape;
use crate::wait::WaitConditionType;
use glam::Vec3;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Directory under the system temp dir, removed on drop
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "detour-navigator-{}-{}-{}",
            name,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Side of the terrain cell used by the scenes
pub const CELL_SIZE: i32 = 64;

/// Samples along one side of the scene heightfields, one per world unit
pub const HEIGHTFIELD_SIZE: usize = 65;

pub fn recast_settings() -> RecastSettings {
    RecastSettings {
        cell_size: 0.5,
        cell_height: 0.1,
        tile_size: 16,
        border_size: 4,
        ..Default::default()
    }
}

/// Synchronous navigator settings without debouncing
pub fn navigator_settings() -> NavigatorSettings {
    NavigatorSettings::default()
        .with_recast(recast_settings())
        .with_threads(0)
        .with_min_update_interval(Duration::ZERO)
}

pub fn agent() -> AgentBounds {
    AgentBounds::new(CollisionShapeType::Cylinder, Vec3::new(0.4, 0.4, 0.9))
}

pub fn navigator(settings: NavigatorSettings) -> Navigator {
    let navigator = Navigator::new(settings).unwrap();
    assert!(navigator.add_agent(agent()));
    navigator
}

pub fn wait_all(navigator: &Navigator) {
    assert!(navigator.wait(WaitConditionType::AllJobsDone, None));
}

/// Heightfield from a function of the sample column and row
pub fn surface(height: impl Fn(usize, usize) -> f32) -> HeightfieldShape {
    let n = HEIGHTFIELD_SIZE;
    let heights: Vec<f32> = (0..n * n).map(|i| height(i % n, i / n)).collect();
    let min_height = heights.iter().copied().fold(f32::MAX, f32::min);
    let max_height = heights.iter().copied().fold(f32::MIN, f32::max);
    HeightfieldShape::Surface {
        heights: Arc::from(heights),
        size: n,
        min_height,
        max_height,
    }
}

/// Flat ground with a 10 deep, steep-walled pit around the cell centre
pub fn pit() -> HeightfieldShape {
    surface(|column, row| {
        if (28..=36).contains(&column) && (28..=36).contains(&row) {
            -10.0
        } else {
            0.0
        }
    })
}

/// Flat ground cut by a 20 deep channel along Y for `row <= 40`.
///
/// Each bank has a one unit wide ramp at 45 degrees.
pub fn channel() -> HeightfieldShape {
    surface(|column, row| match (column, row) {
        (25 | 39, 0..=40) => -1.0,
        (26..=38, 0..=40) => -20.0,
        _ => 0.0,
    })
}

/// Runs a path search with default costs
pub fn find_path(navigator: &Navigator, start: Vec3, end: Vec3, flags: Flags) -> (Status, Vec<Vec3>) {
    let mut path = Vec::new();
    let status = navigator.find_path(&agent(), start, end, flags, &AreaCosts::default(), 0.0, &mut path);
    (status, path)
}

pub fn assert_near(actual: Vec3, expected: Vec3, tolerance: f32) {
    assert!(
        actual.abs_diff_eq(expected, tolerance),
        "{actual} is not within {tolerance} of {expected}"
    );
}
