//! Grid geometry for stitching per-partition layouts into one canvas.
//!
//! Partition `i` owns cell `i` of a square grid filled row-major. Its local
//! layout is normalized into `[0, 1]` per axis and then scaled into the cell
//! minus a padding margin on each side, so different partitions never
//! overlap.

use std::collections::BTreeMap;

use pam_core::Position;

pub const DEFAULT_CELL_SIZE: f64 = 100.0;
pub const DEFAULT_PADDING_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// Cells per row (and per column).
    pub side: usize,
    pub cell_size: f64,
    /// Fraction of the cell kept empty on each side.
    pub padding_ratio: f64,
}

impl GridSpec {
    /// Smallest square grid with room for `cells` cells.
    pub fn for_cells(cells: usize) -> Self {
        Self::with_geometry(cells, DEFAULT_CELL_SIZE, DEFAULT_PADDING_RATIO)
    }

    pub fn with_geometry(cells: usize, cell_size: f64, padding_ratio: f64) -> Self {
        Self {
            side: ceil_sqrt(cells),
            cell_size,
            padding_ratio: padding_ratio.clamp(0.0, 0.49),
        }
    }

    /// `(row, col)` of cell `index`.
    pub fn cell(&self, index: usize) -> (usize, usize) {
        let side = self.side.max(1);
        (index / side, index % side)
    }

    /// Lower-left corner of cell `index`.
    pub fn origin(&self, index: usize) -> Position {
        let (row, col) = self.cell(index);
        Position::new(col as f64 * self.cell_size, row as f64 * self.cell_size)
    }

    pub fn padding(&self) -> f64 {
        self.cell_size * self.padding_ratio
    }

    /// Edge length of the drawable area inside a cell.
    pub fn inner_size(&self) -> f64 {
        self.cell_size - 2.0 * self.padding()
    }

    /// Map a local layout into cell `index`.
    pub fn place<K: Ord + Clone>(
        &self,
        index: usize,
        local: &BTreeMap<K, Position>,
    ) -> BTreeMap<K, Position> {
        let Some(bounds) = Bounds::of(local.values()) else {
            return BTreeMap::new();
        };
        let origin = self.origin(index);
        let pad = self.padding();
        let inner = self.inner_size();
        local
            .iter()
            .map(|(key, pos)| {
                let (nx, ny) = bounds.normalize(pos);
                (
                    key.clone(),
                    Position::new(origin.x + pad + nx * inner, origin.y + pad + ny * inner),
                )
            })
            .collect()
    }
}

/// Axis-aligned bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Position,
    pub max: Position,
}

impl Bounds {
    /// `None` for an empty set. Non-finite coordinates are skipped.
    pub fn of<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut bounds: Option<Bounds> = None;
        for p in points.into_iter().filter(|p| p.is_finite()) {
            bounds = Some(match bounds {
                None => Bounds { min: *p, max: *p },
                Some(b) => Bounds {
                    min: Position::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                    max: Position::new(b.max.x.max(p.x), b.max.y.max(p.y)),
                },
            });
        }
        bounds
    }

    /// Normalize into `[0, 1]` per axis; a zero-extent axis maps to 0.5.
    pub fn normalize(&self, p: &Position) -> (f64, f64) {
        (
            normalize_axis(p.x, self.min.x, self.max.x),
            normalize_axis(p.y, self.min.y, self.max.y),
        )
    }
}

fn normalize_axis(value: f64, min: f64, max: f64) -> f64 {
    let extent = max - min;
    if !value.is_finite() || extent <= f64::EPSILON * min.abs().max(max.abs()).max(1.0) {
        0.5
    } else {
        ((value - min) / extent).clamp(0.0, 1.0)
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    while side > 0 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_is_ceil_sqrt() {
        assert_eq!(GridSpec::for_cells(0).side, 0);
        assert_eq!(GridSpec::for_cells(1).side, 1);
        assert_eq!(GridSpec::for_cells(4).side, 2);
        assert_eq!(GridSpec::for_cells(5).side, 3);
        assert_eq!(GridSpec::for_cells(10).side, 4);
    }

    #[test]
    fn cells_fill_row_major() {
        let grid = GridSpec::for_cells(5);
        assert_eq!(grid.cell(0), (0, 0));
        assert_eq!(grid.cell(2), (0, 2));
        assert_eq!(grid.cell(4), (1, 1));
        assert_eq!(grid.origin(4), Position::new(100.0, 100.0));
    }

    #[test]
    fn single_point_lands_in_cell_center() {
        let grid = GridSpec::for_cells(1);
        let mut local = BTreeMap::new();
        local.insert("a", Position::new(-3.0, 12.0));
        let placed = grid.place(0, &local);
        assert_eq!(placed["a"], Position::new(50.0, 50.0));
    }

    #[test]
    fn placed_points_stay_inside_padded_cell() {
        let grid = GridSpec::for_cells(3);
        let mut local = BTreeMap::new();
        local.insert(1, Position::new(-10.0, 0.0));
        local.insert(2, Position::new(10.0, 5.0));
        local.insert(3, Position::new(0.0, 2.5));
        let placed = grid.place(2, &local);
        // cell 2 of a 2x2 grid is row 1, col 0
        for pos in placed.values() {
            assert!(pos.x >= 10.0 && pos.x <= 90.0, "{pos:?}");
            assert!(pos.y >= 110.0 && pos.y <= 190.0, "{pos:?}");
        }
        assert_eq!(placed[&1], Position::new(10.0, 110.0));
        assert_eq!(placed[&2], Position::new(90.0, 190.0));
    }

    #[test]
    fn flat_axis_is_centered() {
        let grid = GridSpec::for_cells(1);
        let mut local = BTreeMap::new();
        local.insert('a', Position::new(0.0, 7.0));
        local.insert('b', Position::new(4.0, 7.0));
        let placed = grid.place(0, &local);
        assert_eq!(placed[&'a'].y, 50.0);
        assert_eq!(placed[&'b'].x, 90.0);
    }

    #[test]
    fn empty_layout_places_nothing() {
        let grid = GridSpec::for_cells(1);
        let local: BTreeMap<u8, Position> = BTreeMap::new();
        assert!(grid.place(0, &local).is_empty());
    }
}
