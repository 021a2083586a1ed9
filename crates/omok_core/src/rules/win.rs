//! Five-in-a-row detection around the last placed stone.

use super::super::{Board, Cell, Position};
use tracing::instrument;

/// Stones in a row needed to win.
pub const WIN_LENGTH: usize = 5;

/// The four axes through a cell as `(d_row, d_col)`.
///
/// In index terms these are horizontal (+1), vertical (+15),
/// down-right (+16) and down-left (+14). Walking them on coordinates means
/// every non-vertical axis stops at the row edge instead of wrapping.
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Checks whether the stone at `position` completes five or more in a row.
///
/// Returns `false` for an empty cell.
#[instrument(skip(board))]
pub fn check_win(position: Position, board: &Board) -> bool {
    AXES.iter()
        .any(|&(d_row, d_col)| run_length(position, board, d_row, d_col) >= WIN_LENGTH)
}

/// Length of the same-colored run through `position` along one axis.
///
/// Counts the stone itself plus consecutive matches in both directions,
/// stopping at the first different cell or at the board edge. An empty
/// `position` has run length 0.
pub fn run_length(position: Position, board: &Board, d_row: isize, d_col: isize) -> usize {
    let stone = match board.get(position) {
        Cell::Occupied(stone) => stone,
        Cell::Empty => return 0,
    };

    let mut count = 1;
    for (dr, dc) in [(d_row, d_col), (-d_row, -d_col)] {
        let mut cursor = position.step(dr, dc);
        while let Some(next) = cursor {
            if board.get(next) != Cell::Occupied(stone) {
                break;
            }
            count += 1;
            cursor = next.step(dr, dc);
        }
    }
    count
}
