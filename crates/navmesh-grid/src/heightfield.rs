//! Span grid: the solid columns produced by rasterization

/// A solid vertical interval in one column, in cell heights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Lower bound of the span
    pub min: i32,
    /// Upper bound of the span
    pub max: i32,
    /// Area id of the span top
    pub area: u8,
}

/// A square grid of span columns
#[derive(Debug, Clone)]
pub struct SpanGrid {
    /// Cells along one side
    pub size: i32,
    /// Minimum corner of the grid in world XY
    pub origin: glam::Vec2,
    /// Cell size
    pub cs: f32,
    /// Cell height
    pub ch: f32,
    columns: Vec<Vec<Span>>,
}

impl SpanGrid {
    /// Creates an empty grid
    pub fn new(size: i32, origin: glam::Vec2, cs: f32, ch: f32) -> Self {
        let size = size.max(0);
        Self {
            size,
            origin,
            cs,
            ch,
            columns: vec![Vec::new(); (size * size) as usize],
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return None;
        }
        Some((y * self.size + x) as usize)
    }

    /// Spans of one column, ordered bottom to top
    pub fn column(&self, x: i32, y: i32) -> &[Span] {
        match self.index(x, y) {
            Some(i) => &self.columns[i],
            None => &[],
        }
    }

    /// Total number of spans in the grid
    pub fn span_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    /// Adds a span, merging it with every span it overlaps.
    ///
    /// When the merged top lies within `merge_threshold` of an existing span top,
    /// the larger area id wins. Out of bounds positions are ignored.
    pub fn add_span(&mut self, x: i32, y: i32, min: i32, max: i32, area: u8, merge_threshold: i32) {
        let Some(index) = self.index(x, y) else {
            return;
        };
        let column = &mut self.columns[index];
        let mut new_span = Span { min, max, area };

        let mut i = 0;
        while i < column.len() {
            let current = column[i];
            if current.min > new_span.max {
                break;
            }
            if current.max < new_span.min {
                i += 1;
                continue;
            }

            new_span.min = new_span.min.min(current.min);
            new_span.max = new_span.max.max(current.max);
            if (new_span.max - current.max).abs() <= merge_threshold {
                new_span.area = new_span.area.max(current.area);
            }
            column.remove(i);
        }

        column.insert(i, new_span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn grid() -> SpanGrid {
        SpanGrid::new(4, Vec2::ZERO, 1.0, 0.1)
    }

    #[test]
    fn test_disjoint_spans_are_sorted() {
        let mut grid = grid();
        grid.add_span(1, 1, 20, 30, 63, 1);
        grid.add_span(1, 1, 0, 5, 63, 1);
        let column = grid.column(1, 1);
        assert_eq!(column.len(), 2);
        assert_eq!(column[0].min, 0);
        assert_eq!(column[1].min, 20);
    }

    #[test]
    fn test_overlapping_spans_merge() {
        let mut grid = grid();
        grid.add_span(0, 0, 0, 10, 0, 1);
        grid.add_span(0, 0, 8, 20, 0, 1);
        grid.add_span(0, 0, 19, 21, 63, 1);
        assert_eq!(
            grid.column(0, 0),
            &[Span {
                min: 0,
                max: 21,
                area: 63
            }]
        );
    }

    #[test]
    fn test_lower_span_does_not_change_top_area() {
        let mut grid = grid();
        grid.add_span(2, 3, 0, 10, 63, 1);
        grid.add_span(2, 3, 0, 5, 0, 1);
        assert_eq!(grid.column(2, 3)[0].area, 63);
        grid.add_span(2, 3, 5, 10, 0, 1);
        assert_eq!(grid.column(2, 3)[0].area, 63);
    }

    #[test]
    fn test_higher_span_replaces_top_area() {
        let mut grid = grid();
        grid.add_span(0, 0, 0, 10, 63, 1);
        grid.add_span(0, 0, 5, 30, 0, 1);
        assert_eq!(grid.column(0, 0)[0].area, 0);
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut grid = grid();
        grid.add_span(-1, 0, 0, 1, 63, 1);
        grid.add_span(0, 4, 0, 1, 63, 1);
        assert_eq!(grid.span_count(), 0);
    }
}
