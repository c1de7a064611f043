//! Geometry helpers on the horizontal XY plane.
//!
//! The navigator works in a Z-up world: X and Y span the ground plane and Z is height.

use glam::{Vec2, Vec3};

/// Twice the signed area of a triangle projected onto the XY plane.
///
/// Positive for counter-clockwise winding when looking down the Z axis.
#[inline]
pub fn tri_area_2d(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let acx = c.x - a.x;
    let acy = c.y - a.y;
    abx * acy - acx * aby
}

/// Area of a triangle in 3D.
#[inline]
pub fn triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b - a).cross(c - a).length() * 0.5
}

/// Unit normal of a triangle, zero for degenerate triangles.
///
/// Edges are scaled down before the cross product so triangles spanning huge
/// coordinates do not overflow.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let scale = ab.abs().max_element().max(ac.abs().max_element());
    if !scale.is_finite() || scale <= 0.0 {
        return Vec3::ZERO;
    }
    (ab / scale).cross(ac / scale).normalize_or_zero()
}

/// True when every coordinate is finite and the triangle has a non-zero area.
#[inline]
pub fn is_valid_triangle(a: Vec3, b: Vec3, c: Vec3) -> bool {
    a.is_finite() && b.is_finite() && c.is_finite() && triangle_normal(a, b, c) != Vec3::ZERO
}

/// Horizontal bounds of a triangle.
#[inline]
pub fn triangle_bounds_2d(a: Vec3, b: Vec3, c: Vec3) -> (Vec2, Vec2) {
    let min = a.truncate().min(b.truncate()).min(c.truncate());
    let max = a.truncate().max(b.truncate()).max(c.truncate());
    (min, max)
}

/// Check whether two horizontal rectangles overlap. Touching edges count as overlap.
#[inline]
pub fn overlap_bounds_2d(amin: Vec2, amax: Vec2, bmin: Vec2, bmax: Vec2) -> bool {
    amin.x <= bmax.x && amax.x >= bmin.x && amin.y <= bmax.y && amax.y >= bmin.y
}

/// Squared horizontal distance between two points.
#[inline]
pub fn dist_sqr_2d(a: Vec3, b: Vec3) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dx * dx + dy * dy
}

/// Clamp a value into `[min, max]`.
#[inline]
pub fn clamp<T: PartialOrd>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tri_area_2d_winding() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 5.0);
        let c = Vec3::new(0.0, 1.0, -3.0);
        assert_eq!(tri_area_2d(a, b, c), 1.0);
        assert_eq!(tri_area_2d(a, c, b), -1.0);
    }

    #[test]
    fn test_degenerate_triangles_are_invalid() {
        let a = Vec3::ZERO;
        let b = Vec3::X;
        assert!(!is_valid_triangle(a, b, Vec3::new(2.0, 0.0, 0.0)));
        assert!(!is_valid_triangle(a, b, Vec3::new(f32::NAN, 1.0, 0.0)));
        assert!(is_valid_triangle(a, b, Vec3::Y));
    }

    #[test]
    fn test_triangle_normal_of_huge_triangle() {
        let normal = triangle_normal(
            Vec3::new(-1e30, -1e30, 0.0),
            Vec3::new(1e30, -1e30, 0.0),
            Vec3::new(-1e30, 1e30, 0.0),
        );
        assert_eq!(normal, Vec3::Z);
        assert!(is_valid_triangle(
            Vec3::new(-1e30, -1e30, 0.0),
            Vec3::new(1e30, -1e30, 0.0),
            Vec3::new(-1e30, 1e30, 0.0),
        ));
    }

    #[test]
    fn test_overlap_bounds_2d() {
        let amin = Vec2::ZERO;
        let amax = Vec2::splat(1.0);
        assert!(overlap_bounds_2d(amin, amax, Vec2::splat(1.0), Vec2::splat(2.0)));
        assert!(!overlap_bounds_2d(amin, amax, Vec2::splat(1.5), Vec2::splat(2.0)));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5, 0, 3), 3);
        assert_eq!(clamp(-1.0, 0.0, 3.0), 0.0);
        assert_eq!(clamp(2, 0, 3), 2);
    }
}
