//! Triangle rasterization into a span grid
//!
//! Each triangle is clipped against the grid rows (Y) and then columns (X); the
//! height range of every clipped piece becomes one span.

use crate::heightfield::SpanGrid;
use crate::NULL_AREA;
use glam::{Vec2, Vec3};
use navigator_common::{overlap_bounds_2d, triangle_bounds_2d, triangle_normal, Error, Result};

/// Axis used for polygon clipping
#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    fn of(self, v: Vec3) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }
}

/// Divides a convex polygon by an axis-aligned line.
///
/// Vertices below `offset` go to `below`, the rest to `above`; crossing edges add
/// their intersection to both.
fn divide_poly(input: &[Vec3], below: &mut Vec<Vec3>, above: &mut Vec<Vec3>, offset: f32, axis: Axis) {
    below.clear();
    above.clear();

    let n = input.len();
    for i in 0..n {
        let vi = input[i];
        let vj = input[(i + 1) % n];
        let di = offset - axis.of(vi);
        let dj = offset - axis.of(vj);
        let crosses = (di > 0.0 && dj < 0.0) || (di < 0.0 && dj > 0.0);

        if di >= 0.0 {
            below.push(vi);
            if di == 0.0 {
                above.push(vi);
            }
        } else {
            above.push(vi);
        }

        if crosses {
            // f64 keeps the cut accurate for triangles far larger than a tile
            let (a, b) = (f64::from(axis.of(vi)), f64::from(axis.of(vj)));
            let t = (f64::from(offset) - a) / (b - a);
            let lerp = |p: f32, q: f32| (f64::from(p) + (f64::from(q) - f64::from(p)) * t) as f32;
            let mut intersection = Vec3::new(lerp(vi.x, vj.x), lerp(vi.y, vj.y), lerp(vi.z, vj.z));
            match axis {
                Axis::X => intersection.x = offset,
                Axis::Y => intersection.y = offset,
            }
            below.push(intersection);
            above.push(intersection);
        }
    }
}

/// Rasterizes a single triangle into the grid
pub fn rasterize_triangle(
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    area: u8,
    grid: &mut SpanGrid,
    merge_threshold: i32,
) {
    let (tri_min, tri_max) = triangle_bounds_2d(v0, v1, v2);
    let grid_max = grid.origin + Vec2::splat(grid.size as f32 * grid.cs);
    if !overlap_bounds_2d(tri_min, tri_max, grid.origin, grid_max) {
        return;
    }

    let inverse_cs = 1.0 / grid.cs;
    let inverse_ch = 1.0 / grid.ch;

    // Start one row/column early so the polygon is cut properly at the grid edge
    let x0 = (((tri_min.x - grid.origin.x) * inverse_cs).floor() as i32).max(-1);
    let x1 = (((tri_max.x - grid.origin.x) * inverse_cs).floor() as i32).min(grid.size - 1);
    let y0 = (((tri_min.y - grid.origin.y) * inverse_cs).floor() as i32).max(-1);
    let y1 = (((tri_max.y - grid.origin.y) * inverse_cs).floor() as i32).min(grid.size - 1);

    let mut rest = vec![v0, v1, v2];
    let mut row = Vec::with_capacity(7);
    let mut row_rest = Vec::with_capacity(7);
    let mut cell = Vec::with_capacity(7);
    let mut cell_rest = Vec::with_capacity(7);

    for y in y0..=y1 {
        let row_max = grid.origin.y + (y + 1) as f32 * grid.cs;
        divide_poly(&rest, &mut row, &mut row_rest, row_max, Axis::Y);
        std::mem::swap(&mut rest, &mut row_rest);

        if row.len() < 3 || y < 0 {
            continue;
        }

        let mut columns = row.clone();
        for x in x0..=x1 {
            let column_max = grid.origin.x + (x + 1) as f32 * grid.cs;
            divide_poly(&columns, &mut cell, &mut cell_rest, column_max, Axis::X);
            std::mem::swap(&mut columns, &mut cell_rest);

            if cell.len() < 3 || x < 0 {
                continue;
            }

            let (min_z, max_z) = cell
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.z), hi.max(v.z)));

            let span_min = (min_z * inverse_ch).floor() as i32;
            let span_max = ((max_z * inverse_ch).ceil() as i32).max(span_min.saturating_add(1));

            grid.add_span(x, y, span_min, span_max, area, merge_threshold);
        }
    }
}

/// Replaces the area of every triangle steeper than `walkable_slope_angle` with the null area.
///
/// Triangles are treated as two-sided: only the angle between the face and the
/// horizontal plane matters.
pub fn clear_unwalkable_triangles(
    walkable_slope_angle: f32,
    vertices: &[f32],
    indices: &[u32],
    areas: &mut [u8],
) -> Result<()> {
    let threshold = walkable_slope_angle.to_radians().cos();
    for (i, area) in areas.iter_mut().enumerate() {
        let [a, b, c] = triangle(vertices, indices, i)?;
        let normal = triangle_normal(a, b, c);
        if normal.z.abs() < threshold {
            *area = NULL_AREA;
        }
    }
    Ok(())
}

/// Rasterizes indexed triangles into the grid
pub fn rasterize_triangles(
    vertices: &[f32],
    indices: &[u32],
    areas: &[u8],
    grid: &mut SpanGrid,
    merge_threshold: i32,
) -> Result<()> {
    if indices.len() != areas.len() * 3 {
        return Err(Error::InvalidGeometry(format!(
            "{} indices do not match {} triangle areas",
            indices.len(),
            areas.len()
        )));
    }

    for (i, &area) in areas.iter().enumerate() {
        let [a, b, c] = triangle(vertices, indices, i)?;
        rasterize_triangle(a, b, c, area, grid, merge_threshold);
    }

    Ok(())
}

fn triangle(vertices: &[f32], indices: &[u32], triangle: usize) -> Result<[Vec3; 3]> {
    let mut out = [Vec3::ZERO; 3];
    for (k, v) in out.iter_mut().enumerate() {
        let index = indices
            .get(triangle * 3 + k)
            .copied()
            .ok_or_else(|| Error::InvalidGeometry(format!("triangle {triangle} is incomplete")))?
            as usize;
        let slice = vertices.get(index * 3..index * 3 + 3).ok_or_else(|| {
            Error::InvalidGeometry(format!("vertex index {index} is out of range"))
        })?;
        *v = Vec3::from_slice(slice);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpanGrid {
        SpanGrid::new(4, Vec2::ZERO, 1.0, 0.1)
    }

    #[test]
    fn test_divide_poly_splits_square() {
        let square = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let mut below = Vec::new();
        let mut above = Vec::new();
        divide_poly(&square, &mut below, &mut above, 1.0, Axis::X);
        assert_eq!(below.len(), 4);
        assert_eq!(above.len(), 4);
        assert!(below.iter().all(|v| v.x <= 1.0));
        assert!(above.iter().all(|v| v.x >= 1.0));
    }

    #[test]
    fn test_flat_quad_fills_covered_cells() {
        let mut grid = grid();
        let vertices = [0.2, 0.2, 1.0, 1.8, 0.2, 1.0, 1.8, 1.8, 1.0, 0.2, 1.8, 1.0];
        let indices = [0, 1, 2, 0, 2, 3];
        rasterize_triangles(&vertices, &indices, &[63, 63], &mut grid, 1).unwrap();

        for y in 0..4 {
            for x in 0..4 {
                let column = grid.column(x, y);
                if x < 2 && y < 2 {
                    assert_eq!(column.len(), 1, "cell {x},{y}");
                    assert_eq!(column[0].area, 63);
                    assert!((column[0].max as f32 * 0.1 - 1.0).abs() < 0.15);
                } else {
                    assert!(column.is_empty(), "cell {x},{y}");
                }
            }
        }
    }

    #[test]
    fn test_triangle_outside_grid_is_ignored() {
        let mut grid = grid();
        rasterize_triangle(
            Vec3::new(10.0, 10.0, 0.0),
            Vec3::new(11.0, 10.0, 0.0),
            Vec3::new(10.0, 11.0, 0.0),
            63,
            &mut grid,
            1,
        );
        assert_eq!(grid.span_count(), 0);
    }

    #[test]
    fn test_steep_triangles_are_cleared() {
        let vertices = [
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // flat
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, // vertical
        ];
        let indices = [0, 1, 2, 3, 4, 5];
        let mut areas = [63, 63];
        clear_unwalkable_triangles(45.0, &vertices, &indices, &mut areas).unwrap();
        assert_eq!(areas, [63, NULL_AREA]);
    }

    #[test]
    fn test_bad_index_is_an_error() {
        let mut grid = grid();
        let vertices = [0.0, 0.0, 0.0];
        assert!(rasterize_triangles(&vertices, &[0, 0, 7], &[63], &mut grid, 1).is_err());
        assert!(rasterize_triangles(&vertices, &[0, 0, 0], &[], &mut grid, 1).is_err());
    }
}
