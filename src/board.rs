//! The Sudoku board value type shared by the server authority and the client protocol.
//!
//! A [`Board`] is a plain 9x9 grid of digits with `0` marking an empty cell. It carries
//! no synchronization state of its own; the two predicates here are the only game rules
//! the engine knows about:
//!
//! - [`Board::is_legal_placement`] is *advisory*: the client checks it before sending a
//!   move, the authority never re-checks it.
//! - [`Board::is_complete`] only tests that no cell is empty. A fully filled but invalid
//!   board still counts as complete; callers needing strict validation must re-run
//!   legality checks themselves.

use serde::{Deserialize, Serialize};

use crate::{GridroomError, BOX_SIZE, EMPTY_CELL, GRID_SIZE};

/// A 9x9 Sudoku grid of digits in `[0, 9]`, where `0` denotes an empty cell.
///
/// Serializes as a nested array of numbers, matching the wire and storage format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board([[u8; GRID_SIZE]; GRID_SIZE]);

impl Board {
    /// Creates a board from raw cells. Values are taken as-is; callers own range hygiene.
    #[must_use]
    pub const fn new(cells: [[u8; GRID_SIZE]; GRID_SIZE]) -> Self {
        Board(cells)
    }

    /// Creates an all-empty board.
    #[must_use]
    pub const fn empty() -> Self {
        Board([[EMPTY_CELL; GRID_SIZE]; GRID_SIZE])
    }

    /// Returns the cell value at `(row, col)`, or `None` if the coordinates are
    /// outside the grid.
    #[inline]
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<u8> {
        self.0.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Sets the cell at `(row, col)` to `value` unconditionally.
    ///
    /// `0` clears the cell. No legality check is performed; this mirrors the
    /// authority's trust boundary where placements are applied as sent.
    ///
    /// # Errors
    ///
    /// - [`GridroomError::CellOutOfBounds`] if the coordinates are outside the grid.
    /// - [`GridroomError::InvalidDigit`] if `value > 9`.
    pub fn set(&mut self, row: usize, col: usize, value: u8) -> Result<(), GridroomError> {
        if value > 9 {
            return Err(GridroomError::InvalidDigit { value });
        }
        let cell = self
            .0
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(GridroomError::CellOutOfBounds {
                row: row as u8,
                col: col as u8,
            })?;
        *cell = value;
        Ok(())
    }

    /// Returns a reference to the raw cells.
    #[inline]
    #[must_use]
    pub const fn cells(&self) -> &[[u8; GRID_SIZE]; GRID_SIZE] {
        &self.0
    }

    /// Returns `true` iff placing `value` at `(row, col)` is legal against the
    /// *currently filled* cells: the value is a digit in `[1, 9]`, the target cell is
    /// empty, and the value does not already appear in the same row, column, or 3x3 box.
    ///
    /// Pure; never mutates. Out-of-bounds coordinates are simply illegal.
    #[must_use]
    pub fn is_legal_placement(&self, row: usize, col: usize, value: u8) -> bool {
        if !(1..=9).contains(&value) {
            return false;
        }
        let Some(current) = self.cell(row, col) else {
            return false;
        };
        if current != EMPTY_CELL {
            return false;
        }

        for x in 0..GRID_SIZE {
            if self.0[row][x] == value {
                return false;
            }
            if self.0[x][col] == value {
                return false;
            }
        }

        let box_row = (row / BOX_SIZE) * BOX_SIZE;
        let box_col = (col / BOX_SIZE) * BOX_SIZE;
        for i in 0..BOX_SIZE {
            for j in 0..BOX_SIZE {
                if self.0[box_row + i][box_col + j] == value {
                    return false;
                }
            }
        }

        true
    }

    /// Returns `true` iff every cell is non-zero.
    ///
    /// Does **not** verify correctness against Sudoku constraints.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0
            .iter()
            .all(|row| row.iter().all(|&cell| cell != EMPTY_CELL))
    }

    /// Counts the empty cells remaining on the board.
    #[must_use]
    pub fn empty_cells(&self) -> usize {
        self.0
            .iter()
            .map(|row| row.iter().filter(|&&cell| cell == EMPTY_CELL).count())
            .sum()
    }
}
