//! Core domain types for five-in-a-row.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

/// Number of rows (and columns) on the board.
pub const BOARD_SIZE: usize = 15;

/// Number of cells on the board.
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Stone color. Black always moves first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum Stone {
    /// First player.
    Black,
    /// Second player.
    White,
}

impl Stone {
    /// Returns the other color.
    pub fn opponent(self) -> Self {
        match self {
            Stone::Black => Stone::White,
            Stone::White => Stone::Black,
        }
    }

    /// Color of the entry committed at `move_order` (1-based): odd is Black, even is White.
    pub fn for_move_order(move_order: u32) -> Self {
        if move_order % 2 == 1 {
            Stone::Black
        } else {
            Stone::White
        }
    }

    /// Color on turn after `committed` entries: an even count means Black.
    pub fn to_move(committed: usize) -> Self {
        if committed % 2 == 0 {
            Stone::Black
        } else {
            Stone::White
        }
    }
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// No stone.
    #[default]
    Empty,
    /// Cell holds a stone.
    Occupied(Stone),
}

/// Cell index outside the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("Position {} is outside the {}x{} board", index, BOARD_SIZE, BOARD_SIZE)]
pub struct PositionError {
    /// The rejected index.
    pub index: i64,
}

/// A cell position, stored as a row-major index in `0..225`.
///
/// Row is `index / 15`, column is `index % 15`. Construction is checked, so a
/// `Position` always names a real cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Position(u8);

impl Position {
    /// Creates a position from a row-major index.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if `index` is not in `0..225`.
    pub fn new(index: i64) -> Result<Self, PositionError> {
        if (0..CELL_COUNT as i64).contains(&index) {
            Ok(Self(index as u8))
        } else {
            Err(PositionError { index })
        }
    }

    /// Creates a position from row and column.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if either coordinate is off the board.
    pub fn from_row_col(row: usize, col: usize) -> Result<Self, PositionError> {
        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            let index = row.saturating_mul(BOARD_SIZE).saturating_add(col);
            return Err(PositionError {
                index: i64::try_from(index).unwrap_or(i64::MAX),
            });
        }
        Ok(Self((row * BOARD_SIZE + col) as u8))
    }

    /// Row-major index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Zero-based row.
    pub fn row(self) -> usize {
        self.index() / BOARD_SIZE
    }

    /// Zero-based column.
    pub fn col(self) -> usize {
        self.index() % BOARD_SIZE
    }

    /// Steps by `(d_row, d_col)`, returning `None` when the step leaves the board.
    ///
    /// Stepping is done on coordinates, never on the raw index, so a step can
    /// not wrap from the end of one row onto the start of the next.
    pub fn step(self, d_row: isize, d_col: isize) -> Option<Self> {
        let row = self.row().checked_add_signed(d_row)?;
        let col = self.col().checked_add_signed(d_col)?;
        Self::from_row_col(row, col).ok()
    }
}

impl TryFrom<i64> for Position {
    type Error = PositionError;

    fn try_from(index: i64) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<Position> for i64 {
    fn from(position: Position) -> Self {
        position.0 as i64
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({},{})", self.0, self.row(), self.col())
    }
}

impl FromStr for Position {
    type Err = PositionError;

    /// Parses either a bare index (`"112"`) or `"row,col"` (`"7,7"`).
    #[instrument]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = PositionError { index: -1 };
        match s.split_once(',') {
            Some((row, col)) => {
                let row = row.trim().parse::<usize>().map_err(|_| invalid)?;
                let col = col.trim().parse::<usize>().map_err(|_| invalid)?;
                Self::from_row_col(row, col)
            }
            None => Self::new(s.parse::<i64>().map_err(|_| invalid)?),
        }
    }
}

/// 15x15 board. Never stored; always projected from the move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
        }
    }

    /// Gets the cell at the given position.
    pub fn get(&self, position: Position) -> Cell {
        self.cells[position.index()]
    }

    /// Places a stone, overwriting whatever was there.
    pub(crate) fn set(&mut self, position: Position, cell: Cell) {
        self.cells[position.index()] = cell;
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, position: Position) -> bool {
        self.get(position) == Cell::Empty
    }

    /// Returns all cells in row-major order.
    pub fn cells(&self) -> &[Cell; CELL_COUNT] {
        &self.cells
    }

    /// Number of stones of the given color.
    pub fn count(&self, stone: Stone) -> usize {
        self.cells
            .iter()
            .filter(|c| **c == Cell::Occupied(stone))
            .count()
    }

    /// Formats the board as text: `X` black, `O` white, `.` empty.
    pub fn display(&self) -> String {
        let mut result = String::from("   ");
        for col in 0..BOARD_SIZE {
            result.push_str(&format!("{:>3}", col));
        }
        result.push('\n');
        for row in 0..BOARD_SIZE {
            result.push_str(&format!("{:>3}", row));
            for col in 0..BOARD_SIZE {
                let symbol = match self.cells[row * BOARD_SIZE + col] {
                    Cell::Empty => '.',
                    Cell::Occupied(Stone::Black) => 'X',
                    Cell::Occupied(Stone::White) => 'O',
                };
                result.push_str("  ");
                result.push(symbol);
            }
            result.push('\n');
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
