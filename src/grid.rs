//! Row-major matrix with explicit per-cell presence.
//!
//! Only present cells are stored, so the declared shape costs nothing until
//! values are actually read from the file.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: BTreeMap<usize, T>, // row * cols + col
}

impl<T: Copy> Grid<T> {
    /// All cells absent. `rows * cols` must not overflow.
    pub fn absent(rows: usize, cols: usize) -> Self {
        debug_assert!(rows.checked_mul(cols).is_some());
        Self { rows, cols, cells: BTreeMap::new() }
    }

    /// Wrap fully-present row-major values; `values.len()` must be `rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, values: Vec<T>) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        Self { rows, cols, cells: values.into_iter().enumerate().collect() }
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows || col >= self.cols { return None; }
        self.cells.get(&(row * self.cols + col)).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.rows && col < self.cols, "cell ({row}, {col}) outside {}x{}", self.rows, self.cols);
        self.cells.insert(row * self.cols + col, value);
    }

    pub fn row(&self, row: usize) -> Vec<Option<T>> {
        (0..self.cols).map(|c| self.get(row, c)).collect()
    }

    /// Column `col` top to bottom.
    pub fn column(&self, col: usize) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.rows).map(move |r| self.get(r, col))
    }

    pub fn present_count(&self) -> usize { self.cells.len() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presence_is_tracked_per_cell() {
        let mut g = Grid::<f32>::absent(2, 3);
        assert_eq!(g.present_count(), 0);
        g.set(1, 2, 0.0);
        assert_eq!(g.get(1, 2), Some(0.0));
        assert_eq!(g.get(0, 2), None);
        assert_eq!(g.get(2, 0), None);
        assert_eq!(g.row(1), vec![None, None, Some(0.0)]);
        assert_eq!(g.column(2).collect::<Vec<_>>(), vec![None, Some(0.0)]);
    }

    #[test]
    fn row_major_layout() {
        let g = Grid::from_row_major(2, 2, vec![1, 2, 3, 4]);
        assert_eq!(g.get(0, 1), Some(2));
        assert_eq!(g.get(1, 0), Some(3));
        assert_eq!(g.present_count(), 4);
    }

    #[test]
    fn huge_shape_stores_nothing_up_front() {
        let mut g = Grid::<f32>::absent(i32::MAX as usize, 1 << 20);
        assert_eq!(g.present_count(), 0);
        g.set(i32::MAX as usize - 1, 5, 1.0);
        assert_eq!(g.get(i32::MAX as usize - 1, 5), Some(1.0));
        assert_eq!(g.present_count(), 1);
    }
}
