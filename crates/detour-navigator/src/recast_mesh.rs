//! Immutable per-tile build product

use crate::area_type::AreaType;
use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Build stamp of a RecastMesh: `generation` changes when the manager is reset,
/// `revision` on every geometry change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Version {
    pub generation: u64,
    pub revision: u64,
}

impl Version {
    pub fn new(generation: u64, revision: u64) -> Self {
        Self { generation, revision }
    }
}

/// Indexed triangles with a parallel area array
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    indices: Vec<u32>,
    vertices: Vec<f32>,
    area_types: Vec<AreaType>,
}

impl Mesh {
    pub fn new(indices: Vec<u32>, vertices: Vec<f32>, area_types: Vec<AreaType>) -> Self {
        debug_assert_eq!(indices.len(), area_types.len() * 3);
        debug_assert_eq!(vertices.len() % 3, 0);
        Self {
            indices,
            vertices,
            area_types,
        }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Flat `x, y, z` world coordinates
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn area_types(&self) -> &[AreaType] {
        &self.area_types
    }

    pub fn triangle_count(&self) -> usize {
        self.area_types.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.area_types.is_empty()
    }
}

/// Horizontal water plane covering one cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Water {
    pub cell_size: i32,
    pub level: f32,
}

impl Water {
    /// Cell size of water that covers the whole world
    pub const INFINITE: i32 = i32::MAX;

    pub fn is_infinite(&self) -> bool {
        self.cell_size == Self::INFINITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellWater {
    pub cell_position: IVec2,
    pub water: Water,
}

impl CellWater {
    /// World rectangle covered by the water, unbounded for infinite water
    pub fn bounds(&self) -> (Vec2, Vec2) {
        if self.water.is_infinite() {
            return (Vec2::splat(f32::MIN), Vec2::splat(f32::MAX));
        }
        let size = self.water.cell_size as f32;
        let min = self.cell_position.as_vec2() * size;
        (min, min + Vec2::splat(size))
    }
}

/// Part of a terrain height grid overlapping one tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    pub cell_position: IVec2,
    pub cell_size: i32,
    /// Kept rows
    pub length: u32,
    /// Kept columns
    pub width: u32,
    /// First kept column and row of the original grid
    pub min_x: u32,
    pub min_y: u32,
    /// Side of the original square grid
    pub original_size: u32,
    pub min_height: f32,
    pub max_height: f32,
    /// Row-major `width * length` heights
    pub heights: Vec<f32>,
}

impl Heightfield {
    /// Distance between two samples
    pub fn step(&self) -> f32 {
        self.cell_size as f32 / (self.original_size.max(2) - 1) as f32
    }

    /// World X/Y of kept sample `(column, row)`
    pub fn sample_position(&self, column: u32, row: u32) -> Vec2 {
        let origin = self.cell_position.as_vec2() * self.cell_size as f32;
        origin + Vec2::new((self.min_x + column) as f32, (self.min_y + row) as f32) * self.step()
    }

    pub fn height(&self, column: u32, row: u32) -> f32 {
        self.heights
            .get((row * self.width + column) as usize)
            .copied()
            .unwrap_or(self.min_height)
    }
}

/// Terrain cell with a single elevation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatHeightfield {
    pub cell_position: IVec2,
    pub cell_size: i32,
    pub height: f32,
}

impl FlatHeightfield {
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let size = self.cell_size as f32;
        let min = self.cell_position.as_vec2() * size;
        (min, min + Vec2::splat(size))
    }
}

/// Everything a tile is generated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecastMesh {
    version: Version,
    mesh: Mesh,
    water: Vec<CellWater>,
    heightfields: Vec<Heightfield>,
    flat_heightfields: Vec<FlatHeightfield>,
}

impl RecastMesh {
    pub fn new(
        version: Version,
        mesh: Mesh,
        water: Vec<CellWater>,
        heightfields: Vec<Heightfield>,
        flat_heightfields: Vec<FlatHeightfield>,
    ) -> Self {
        Self {
            version,
            mesh,
            water,
            heightfields,
            flat_heightfields,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn water(&self) -> &[CellWater] {
        &self.water
    }

    pub fn heightfields(&self) -> &[Heightfield] {
        &self.heightfields
    }

    pub fn flat_heightfields(&self) -> &[FlatHeightfield] {
        &self.flat_heightfields
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
            && self.water.is_empty()
            && self.heightfields.is_empty()
            && self.flat_heightfields.is_empty()
    }

    /// Same content, ignoring the version
    pub fn same_content(&self, other: &RecastMesh) -> bool {
        self.mesh == other.mesh
            && self.water == other.water
            && self.heightfields == other.heightfields
            && self.flat_heightfields == other.flat_heightfields
    }
}

/// Borrowed view of the content used as cache key input
#[derive(Serialize)]
pub(crate) struct RecastMeshContent<'a> {
    pub mesh: &'a Mesh,
    pub water: &'a [CellWater],
    pub heightfields: &'a [Heightfield],
    pub flat_heightfields: &'a [FlatHeightfield],
}

impl<'a> From<&'a RecastMesh> for RecastMeshContent<'a> {
    fn from(mesh: &'a RecastMesh) -> Self {
        Self {
            mesh: &mesh.mesh,
            water: &mesh.water,
            heightfields: &mesh.heightfields,
            flat_heightfields: &mesh.flat_heightfields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(Version::new(0, 5) < Version::new(1, 0));
        assert!(Version::new(1, 1) < Version::new(1, 2));
    }

    #[test]
    fn test_infinite_water_bounds() {
        let water = CellWater {
            cell_position: IVec2::ZERO,
            water: Water {
                cell_size: Water::INFINITE,
                level: 0.0,
            },
        };
        let (min, max) = water.bounds();
        assert_eq!(min, Vec2::splat(f32::MIN));
        assert_eq!(max, Vec2::splat(f32::MAX));

        let cell = CellWater {
            cell_position: IVec2::new(-1, 2),
            water: Water {
                cell_size: 100,
                level: 0.0,
            },
        };
        assert_eq!(cell.bounds(), (Vec2::new(-100.0, 200.0), Vec2::new(0.0, 300.0)));
    }

    #[test]
    fn test_heightfield_sample_position() {
        let heightfield = Heightfield {
            cell_position: IVec2::new(1, 0),
            cell_size: 8,
            length: 2,
            width: 2,
            min_x: 2,
            min_y: 3,
            original_size: 5,
            min_height: 0.0,
            max_height: 3.0,
            heights: vec![0.0, 1.0, 2.0, 3.0],
        };
        assert_eq!(heightfield.step(), 2.0);
        assert_eq!(heightfield.sample_position(0, 0), Vec2::new(12.0, 6.0));
        assert_eq!(heightfield.sample_position(1, 1), Vec2::new(14.0, 8.0));
        assert_eq!(heightfield.height(1, 1), 3.0);
    }

    #[test]
    fn test_same_content_ignores_version() {
        let a = RecastMesh::new(Version::new(0, 1), Mesh::default(), Vec::new(), Vec::new(), Vec::new());
        let b = RecastMesh::new(Version::new(0, 2), Mesh::default(), Vec::new(), Vec::new(), Vec::new());
        assert!(a.same_content(&b));
        assert_ne!(a, b);
        assert!(a.is_empty());
    }
}
