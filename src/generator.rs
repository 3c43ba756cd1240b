//! Puzzle generation behind the [`PuzzleSource`] seam.
//!
//! The room authority only depends on the trait, so servers can plug in any generation
//! strategy (or a canned-puzzle stub in tests). The shipped [`BacktrackingGenerator`]
//! runs a straightforward constraint-satisfaction backtracking search: solve an empty
//! grid with a shuffled digit order, then blank out a difficulty-keyed number of cells.

use crate::rng::Pcg32;
use crate::{Board, Difficulty, GridroomError, EMPTY_CELL, GRID_SIZE};

/// A freshly generated puzzle with its solution and rated difficulty.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPuzzle {
    /// The puzzle grid handed to players, with empty cells to fill.
    pub puzzle: Board,
    /// The solved grid the puzzle was carved from.
    pub solution: Board,
    /// Difficulty rating based on the solving techniques required.
    pub rating: f64,
    /// The category the rating falls into.
    pub category: Difficulty,
}

/// Source of new puzzles for room creation.
///
/// Implementors take a difficulty label and return a `(puzzle, solution, rating)` triple.
pub trait PuzzleSource {
    /// Generates a new puzzle for the given difficulty.
    fn generate(&mut self, difficulty: Difficulty) -> Result<GeneratedPuzzle, GridroomError>;
}

/// Rating thresholds separating the difficulty categories.
const EASY_THRESHOLD: f64 = 1.5;
const MEDIUM_THRESHOLD: f64 = 2.5;
const HARD_THRESHOLD: f64 = 5.0;

/// Default puzzle generator: backtracking search over a shuffled digit order.
#[derive(Debug, Clone)]
pub struct BacktrackingGenerator {
    rng: Pcg32,
}

impl BacktrackingGenerator {
    /// Creates a generator seeded from system timing.
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(entropy_seed())
    }

    /// Creates a generator with a fixed seed, for deterministic output.
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Produces a fully solved board by backtracking from an empty grid.
    fn solved_board(&mut self) -> Board {
        let mut board = Board::empty();
        // An empty grid always admits a solution, so this cannot fail.
        let _ = solve(&mut board, &mut self.rng);
        board
    }

    /// Blanks out `count` randomly chosen filled cells.
    fn remove_cells(&mut self, board: &mut Board, count: usize) {
        let mut removed = 0;
        while removed < count {
            let row = self.rng.gen_range_usize(0..GRID_SIZE);
            let col = self.rng.gen_range_usize(0..GRID_SIZE);
            if board.cell(row, col) != Some(EMPTY_CELL) {
                // Both coordinates are in range, so set cannot fail.
                let _ = board.set(row, col, EMPTY_CELL);
                removed += 1;
            }
        }
    }

    /// Rates the puzzle: a base rating for basic techniques plus a small random
    /// variation so repeated generations at the same difficulty differ.
    fn rate(&mut self) -> f64 {
        1.0 + self.rng.gen_f64() * 0.5
    }
}

impl Default for BacktrackingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PuzzleSource for BacktrackingGenerator {
    fn generate(&mut self, difficulty: Difficulty) -> Result<GeneratedPuzzle, GridroomError> {
        let solution = self.solved_board();
        let mut puzzle = solution;
        self.remove_cells(&mut puzzle, difficulty.cells_to_remove());
        let rating = self.rate();
        Ok(GeneratedPuzzle {
            puzzle,
            solution,
            rating,
            category: category_for(rating),
        })
    }
}

/// Maps a rating onto its difficulty category.
#[must_use]
pub fn category_for(rating: f64) -> Difficulty {
    if rating < EASY_THRESHOLD {
        Difficulty::Easy
    } else if rating < MEDIUM_THRESHOLD {
        Difficulty::Medium
    } else if rating < HARD_THRESHOLD {
        Difficulty::Hard
    } else {
        Difficulty::Diabolical
    }
}

/// Backtracking solver. Fills the first empty cell with each candidate digit in a
/// freshly shuffled order and recurses; returns `true` once the grid is solved.
fn solve(board: &mut Board, rng: &mut Pcg32) -> bool {
    let Some((row, col)) = first_empty(board) else {
        return true;
    };
    let mut digits = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
    rng.shuffle(&mut digits);
    for value in digits {
        if board.is_legal_placement(row, col, value) {
            if board.set(row, col, value).is_err() {
                return false;
            }
            if solve(board, rng) {
                return true;
            }
            let _ = board.set(row, col, EMPTY_CELL);
        }
    }
    false
}

fn first_empty(board: &Board) -> Option<(usize, usize)> {
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            if board.cell(row, col) == Some(EMPTY_CELL) {
                return Some((row, col));
            }
        }
    }
    None
}

/// Seed derived from system timing. Sufficient for puzzle variety, not for crypto.
fn entropy_seed() -> u64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map_or(0x5eed, |d| d.as_nanos() as u64)
}
