//! Geometry extraction: collision shapes to world-space triangles

use crate::shapes::CollisionGeometry;
use crate::tile_position::TileBounds;
use glam::{Affine3A, Vec3};
use navigator_common::{is_valid_triangle, triangle_bounds_2d};

/// Triangles of a box, indexing its corners as described by [`box_vertex`]
pub const BOX_INDICES: [u32; 36] = [
    0, 2, 3, 3, 1, 0, //
    4, 5, 7, 7, 6, 4, //
    0, 4, 6, 6, 2, 0, //
    1, 3, 7, 7, 5, 1, //
    2, 6, 7, 7, 3, 2, //
    0, 1, 5, 5, 4, 0, //
];

/// Corner `i` of a box: bit 0 negates X, bit 1 negates Y, bit 2 negates Z
pub fn box_vertex(half_extents: Vec3, i: u32) -> Vec3 {
    Vec3::new(
        if i & 1 != 0 { -half_extents.x } else { half_extents.x },
        if i & 2 != 0 { -half_extents.y } else { half_extents.y },
        if i & 4 != 0 { -half_extents.z } else { half_extents.z },
    )
}

/// Calls `out` for every valid world-space triangle of `shape` overlapping `bounds`.
///
/// Triangles with non-finite coordinates or zero area are skipped.
pub fn for_each_triangle(
    shape: &CollisionGeometry,
    transform: &Affine3A,
    bounds: &TileBounds,
    out: &mut dyn FnMut([Vec3; 3]),
) {
    let mut emit = |a: Vec3, b: Vec3, c: Vec3| {
        let tri = [
            transform.transform_point3(a),
            transform.transform_point3(b),
            transform.transform_point3(c),
        ];
        if !is_valid_triangle(tri[0], tri[1], tri[2]) {
            return;
        }
        let (min, max) = triangle_bounds_2d(tri[0], tri[1], tri[2]);
        if bounds.intersects(&TileBounds::new(min, max)) {
            out(tri);
        }
    };

    match shape {
        CollisionGeometry::TriangleMesh { vertices, indices } => {
            for tri in indices.chunks_exact(3) {
                let vertex = |i: u32| vertices.get(i as usize).copied();
                if let (Some(a), Some(b), Some(c)) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2])) {
                    emit(a, b, c);
                }
            }
        }
        CollisionGeometry::Box { half_extents } => {
            for tri in BOX_INDICES.chunks_exact(3) {
                emit(
                    box_vertex(*half_extents, tri[0]),
                    box_vertex(*half_extents, tri[1]),
                    box_vertex(*half_extents, tri[2]),
                );
            }
        }
        CollisionGeometry::HeightField(field) => {
            for y in 0..field.length.saturating_sub(1) {
                for x in 0..field.width.saturating_sub(1) {
                    let v00 = field.local_vertex(x, y);
                    let v10 = field.local_vertex(x + 1, y);
                    let v11 = field.local_vertex(x + 1, y + 1);
                    let v01 = field.local_vertex(x, y + 1);
                    emit(v00, v10, v11);
                    emit(v00, v11, v01);
                }
            }
        }
        CollisionGeometry::CompoundStatic(children) => {
            for child in children {
                for_each_triangle(&child.shape, &(*transform * child.transform), bounds, out);
            }
        }
        CollisionGeometry::CompoundMutable(compound) => {
            for child in compound.children() {
                for_each_triangle(&child.shape, &(*transform * child.transform), bounds, out);
            }
        }
        CollisionGeometry::Scaled { shape, scale } => {
            for_each_triangle(shape, &(*transform * Affine3A::from_scale(*scale)), bounds, out);
        }
        CollisionGeometry::RotatedTranslated { shape, transform: local } => {
            for_each_triangle(shape, &(*transform * *local), bounds, out);
        }
    }
}

/// World-space bounding box of a shape, `None` for shapes without geometry
pub fn world_aabb(shape: &CollisionGeometry, transform: &Affine3A) -> Option<(Vec3, Vec3)> {
    let corners = |half: Vec3| -> Option<(Vec3, Vec3)> {
        let points = (0..8).map(|i| transform.transform_point3(box_vertex(half, i)));
        fold_points(points)
    };

    match shape {
        CollisionGeometry::TriangleMesh { vertices, .. } => {
            fold_points(vertices.iter().map(|v| transform.transform_point3(*v)))
        }
        CollisionGeometry::Box { half_extents } => corners(*half_extents),
        CollisionGeometry::HeightField(field) => corners(field.local_half_extents()),
        CollisionGeometry::CompoundStatic(children) => children
            .iter()
            .filter_map(|c| world_aabb(&c.shape, &(*transform * c.transform)))
            .reduce(union),
        CollisionGeometry::CompoundMutable(compound) => compound
            .children()
            .iter()
            .filter_map(|c| world_aabb(&c.shape, &(*transform * c.transform)))
            .reduce(union),
        CollisionGeometry::Scaled { shape, scale } => {
            world_aabb(shape, &(*transform * Affine3A::from_scale(*scale)))
        }
        CollisionGeometry::RotatedTranslated { shape, transform: local } => {
            world_aabb(shape, &(*transform * *local))
        }
    }
}

fn fold_points(points: impl Iterator<Item = Vec3>) -> Option<(Vec3, Vec3)> {
    points
        .filter(|p| !p.is_nan())
        .map(|p| (p, p))
        .reduce(union)
}

fn union(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> (Vec3, Vec3) {
    (a.0.min(b.0), a.1.max(b.1))
}
