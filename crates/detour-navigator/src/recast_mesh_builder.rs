//! Accumulates geometry for one tile and produces an immutable [`RecastMesh`]

use crate::area_type::AreaType;
use crate::extractor::for_each_triangle;
use crate::recast_mesh::{CellWater, FlatHeightfield, Heightfield, Mesh, RecastMesh, Version, Water};
use crate::shapes::CollisionGeometry;
use crate::tile_position::TileBounds;
use glam::{Affine3A, IVec2, Vec2, Vec3};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
struct RawTriangle {
    area: AreaType,
    vertices: [Vec3; 3],
}

fn cmp_vec3(a: &Vec3, b: &Vec3) -> Ordering {
    a.x.total_cmp(&b.x)
        .then_with(|| a.y.total_cmp(&b.y))
        .then_with(|| a.z.total_cmp(&b.z))
}

fn cmp_triangles(a: &RawTriangle, b: &RawTriangle) -> Ordering {
    a.area.cmp(&b.area).then_with(|| {
        a.vertices
            .iter()
            .zip(&b.vertices)
            .map(|(l, r)| cmp_vec3(l, r))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Collects triangles, water and terrain overlapping one tile's bounds
#[derive(Debug)]
pub struct RecastMeshBuilder {
    bounds: TileBounds,
    triangles: Vec<RawTriangle>,
    water: Vec<CellWater>,
    heightfields: Vec<Heightfield>,
    flat_heightfields: Vec<FlatHeightfield>,
}

impl RecastMeshBuilder {
    pub fn new(bounds: TileBounds) -> Self {
        Self {
            bounds,
            triangles: Vec::new(),
            water: Vec::new(),
            heightfields: Vec::new(),
            flat_heightfields: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &TileBounds {
        &self.bounds
    }

    /// Adds every triangle of `shape` placed by `transform` that overlaps the bounds
    pub fn add_object(&mut self, shape: &CollisionGeometry, transform: &Affine3A, area: AreaType) {
        let bounds = self.bounds;
        let triangles = &mut self.triangles;
        for_each_triangle(shape, transform, &bounds, &mut |vertices| {
            triangles.push(RawTriangle { area, vertices });
        });
    }

    /// Adds water for a cell; returns false when the cell already has water
    pub fn add_water(&mut self, cell_position: IVec2, water: Water) -> bool {
        if self.water.iter().any(|w| w.cell_position == cell_position) {
            return false;
        }
        self.water.push(CellWater { cell_position, water });
        true
    }

    /// Adds the part of a square height grid of side `size` that overlaps the bounds
    pub fn add_heightfield(
        &mut self,
        cell_position: IVec2,
        cell_size: i32,
        heights: &[f32],
        size: usize,
        min_height: f32,
        max_height: f32,
    ) {
        if size < 2 || cell_size <= 0 || heights.len() < size * size {
            log::warn!(
                "Ignoring heightfield at ({}, {}) with size {} and {} heights",
                cell_position.x,
                cell_position.y,
                size,
                heights.len()
            );
            return;
        }
        let cell_min = cell_position.as_vec2() * cell_size as f32;
        let cell_bounds = TileBounds::new(cell_min, cell_min + Vec2::splat(cell_size as f32));
        let Some(overlap) = cell_bounds.intersection(&self.bounds) else {
            return;
        };

        let step = cell_size as f32 / (size - 1) as f32;
        let local = |v: Vec2| ((v - cell_min) / step).round().as_ivec2();
        let n = size as i32;
        let min = (local(overlap.min) - IVec2::ONE).clamp(IVec2::ZERO, IVec2::splat(n));
        let max = (local(overlap.max) + IVec2::ONE).clamp(IVec2::ZERO, IVec2::splat(n));
        let end = (max + IVec2::ONE).min(IVec2::splat(n));
        if end.x - min.x < 2 || end.y - min.y < 2 {
            return;
        }

        let mut kept = Vec::with_capacity(((end.x - min.x) * (end.y - min.y)) as usize);
        for row in min.y..end.y {
            let offset = row as usize * size;
            kept.extend_from_slice(&heights[offset + min.x as usize..offset + end.x as usize]);
        }

        self.heightfields.push(Heightfield {
            cell_position,
            cell_size,
            length: (end.y - min.y) as u32,
            width: (end.x - min.x) as u32,
            min_x: min.x as u32,
            min_y: min.y as u32,
            original_size: size as u32,
            min_height,
            max_height,
            heights: kept,
        });
    }

    /// Adds a terrain cell of uniform height if it overlaps the bounds
    pub fn add_flat_heightfield(&mut self, cell_position: IVec2, cell_size: i32, height: f32) {
        let flat = FlatHeightfield {
            cell_position,
            cell_size,
            height,
        };
        let (min, max) = flat.bounds();
        if self.bounds.intersects(&TileBounds::new(min, max)) {
            self.flat_heightfields.push(flat);
        }
    }

    /// Consumes the builder.
    ///
    /// Triangles are ordered by area then by vertex coordinates and vertices are
    /// numbered in sorted order, so the result does not depend on call order.
    pub fn create(mut self, version: Version) -> RecastMesh {
        self.triangles.sort_by(cmp_triangles);

        let mut unique: Vec<Vec3> = self.triangles.iter().flat_map(|t| t.vertices).collect();
        unique.sort_by(cmp_vec3);
        unique.dedup_by(|a, b| cmp_vec3(a, b).is_eq());

        let mut indices = Vec::with_capacity(self.triangles.len() * 3);
        let mut area_types = Vec::with_capacity(self.triangles.len());
        for triangle in &self.triangles {
            for vertex in &triangle.vertices {
                let index = unique
                    .binary_search_by(|probe| cmp_vec3(probe, vertex))
                    .unwrap_or_else(|i| i);
                indices.push(index as u32);
            }
            area_types.push(triangle.area);
        }
        let vertices = unique.iter().flat_map(|v| v.to_array()).collect();

        let by_cell = |p: &IVec2| (p.x, p.y);
        self.water.sort_by_key(|w| by_cell(&w.cell_position));
        self.heightfields.sort_by_key(|h| by_cell(&h.cell_position));
        self.flat_heightfields.sort_by_key(|h| by_cell(&h.cell_position));

        RecastMesh::new(
            version,
            Mesh::new(indices, vertices, area_types),
            self.water,
            self.heightfields,
            self.flat_heightfields,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder() {
        let builder = RecastMeshBuilder::new(TileBounds::new(Vec2::ZERO, Vec2::ONE));
        let mesh = builder.create(Version::new(1, 2));
        assert!(mesh.is_empty());
        assert_eq!(mesh.version(), Version::new(1, 2));
    }

    #[test]
    fn test_flat_heightfield_outside_bounds_is_dropped() {
        let mut builder = RecastMeshBuilder::new(TileBounds::new(Vec2::ZERO, Vec2::splat(10.0)));
        builder.add_flat_heightfield(IVec2::new(5, 5), 100, 1.0);
        builder.add_flat_heightfield(IVec2::new(0, 0), 100, 2.0);
        let mesh = builder.create(Version::default());
        assert_eq!(mesh.flat_heightfields().len(), 1);
        assert_eq!(mesh.flat_heightfields()[0].height, 2.0);
    }

    #[test]
    fn test_invalid_heightfield_is_ignored() {
        let mut builder = RecastMeshBuilder::new(TileBounds::new(Vec2::ZERO, Vec2::splat(10.0)));
        builder.add_heightfield(IVec2::ZERO, 10, &[0.0; 3], 2, 0.0, 0.0);
        builder.add_heightfield(IVec2::ZERO, 10, &[0.0; 1], 1, 0.0, 0.0);
        assert!(builder.create(Version::default()).heightfields().is_empty());
    }
}
