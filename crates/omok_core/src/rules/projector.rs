//! Board projection from the move log.

use super::super::{Board, Cell, Move};
use tracing::instrument;

/// Projects an ordered entry sequence onto an empty board.
///
/// Expects `moves` sorted by move-order. Forfeit entries leave the board
/// unchanged. Replaying the same sequence always yields the same board.
#[instrument(skip(moves), fields(len = moves.len()))]
pub fn project(moves: &[Move]) -> Board {
    moves.iter().fold(Board::new(), apply_one)
}

/// Applies a single entry to a board.
///
/// Folding this over a sequence is exactly [`project`].
pub fn apply_one(mut board: Board, mv: &Move) -> Board {
    if let Some(position) = mv.position() {
        board.set(position, Cell::Occupied(mv.stone()));
    }
    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, Stone};

    fn place(order: u32, index: i64) -> Move {
        Move::place(1, order, Position::new(index).unwrap())
    }

    #[test]
    fn test_empty_log_projects_empty_board() {
        assert_eq!(project(&[]), Board::new());
    }

    #[test]
    fn test_parity_decides_color() {
        let board = project(&[place(1, 0), place(2, 15)]);
        assert_eq!(board.get(Position::new(0).unwrap()), Cell::Occupied(Stone::Black));
        assert_eq!(board.get(Position::new(15).unwrap()), Cell::Occupied(Stone::White));
    }

    #[test]
    fn test_forfeit_does_not_touch_board() {
        let moves = [place(1, 0), Move::forfeit(1, 2), place(3, 1)];
        let board = project(&moves);
        assert_eq!(board.count(Stone::Black), 2);
        assert_eq!(board.count(Stone::White), 0);
    }

    #[test]
    fn test_incremental_matches_full() {
        let moves = [place(1, 112), place(2, 113), place(3, 127), place(4, 98)];
        let mut incremental = Board::new();
        for mv in &moves {
            incremental = apply_one(incremental, mv);
        }
        assert_eq!(incremental, project(&moves));
    }
}
