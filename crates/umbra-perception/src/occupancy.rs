//! Occupancy queries against one grid snapshot.
//!
//! [`GridOccupancyOracle`] borrows an [`OccupancyGrid`] for the duration of a
//! detection pass and answers one question: is the cell under a world point
//! free, not free, or off the map?
//!
//! Only the exact "definitely free" value counts as [`CellState::Free`];
//! unknown cells and every non-zero cost read as [`CellState::Occupied`].
//!
//! ```rust
//! use umbra_perception::occupancy::{CellState, GridOccupancyOracle};
//! use umbra_types::{GridOrigin, OccupancyGrid, Point2, FREE_CELL};
//!
//! let grid = OccupancyGrid::filled(10, 10, 0.1, GridOrigin::default(), FREE_CELL);
//! let oracle = GridOccupancyOracle::new(&grid);
//!
//! assert_eq!(oracle.classify(Point2::new(0.55, 0.55)), CellState::Free);
//! assert_eq!(oracle.classify(Point2::new(-0.05, 0.5)), CellState::OutOfBounds);
//! ```

use umbra_types::{FREE_CELL, OccupancyGrid, Point2};

/// Result of probing one world point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// The cell holds the "definitely free" value.
    Free,
    /// Any other in-range value, including unknown.
    Occupied,
    /// The point maps outside the grid or the cell array.
    OutOfBounds,
}

/// Integer cell coordinates; may be negative or past the grid edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub col: i64,
    pub row: i64,
}

/// Read-only view over an [`OccupancyGrid`].
#[derive(Debug, Clone, Copy)]
pub struct GridOccupancyOracle<'a> {
    grid: &'a OccupancyGrid,
}

impl<'a> GridOccupancyOracle<'a> {
    pub fn new(grid: &'a OccupancyGrid) -> Self {
        Self { grid }
    }

    /// Cell containing `point`, honouring the origin's translation and yaw.
    ///
    /// Returns `None` for non-finite input or a degenerate resolution, since
    /// those have no meaningful cell.
    pub fn world_to_cell(&self, point: Point2) -> Option<GridCell> {
        let res = self.grid.resolution;
        if !point.is_finite() || !res.is_finite() || res <= 0.0 {
            return None;
        }
        let origin = self.grid.origin;
        let (sin, cos) = origin.yaw.sin_cos();
        let dx = point.x - origin.x;
        let dy = point.y - origin.y;
        let local_x = cos * dx + sin * dy;
        let local_y = -sin * dx + cos * dy;
        Some(GridCell {
            col: (local_x / res).floor() as i64,
            row: (local_y / res).floor() as i64,
        })
    }

    /// Row-major index of `cell`, or `None` when it lies outside the grid
    /// dimensions or past the end of the cell array.
    pub fn cell_index(&self, cell: GridCell) -> Option<usize> {
        let col = usize::try_from(cell.col).ok()?;
        let row = usize::try_from(cell.row).ok()?;
        if col >= self.grid.width || row >= self.grid.height {
            return None;
        }
        let index = row.checked_mul(self.grid.width)?.checked_add(col)?;
        (index < self.grid.cell_count()? && index < self.grid.data.len()).then_some(index)
    }

    /// Classify the cell under a world point.
    pub fn classify(&self, point: Point2) -> CellState {
        let Some(index) = self.world_to_cell(point).and_then(|c| self.cell_index(c)) else {
            return CellState::OutOfBounds;
        };
        if self.grid.data[index] == FREE_CELL {
            CellState::Free
        } else {
            CellState::Occupied
        }
    }
}
