//! Board consistency: the projected board is exactly what the log placed.

use super::super::{Cell, MoveLog, project};
use super::Invariant;

/// Invariant: each placement's cell holds its parity color, and the board
/// has no stones beyond the log's placements.
pub struct BoardConsistentInvariant;

impl Invariant<MoveLog> for BoardConsistentInvariant {
    fn holds(log: &MoveLog) -> bool {
        let board = project(log.moves());
        let placed = log
            .moves()
            .iter()
            .filter(|mv| mv.position().is_some())
            .count();
        let occupied = board
            .cells()
            .iter()
            .filter(|cell| **cell != Cell::Empty)
            .count();

        placed == occupied
            && log.moves().iter().all(|mv| match mv.position() {
                Some(position) => board.get(position) == Cell::Occupied(mv.stone()),
                None => true,
            })
    }

    fn description() -> &'static str {
        "Board stones match the log's placements and their parity colors"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, Position};

    #[test]
    fn test_holds_for_replayed_log() {
        let log = MoveLog::from_moves(
            1,
            vec![
                Move::place(1, 1, Position::new(0).unwrap()),
                Move::place(1, 2, Position::new(224).unwrap()),
            ],
        )
        .unwrap();
        assert!(BoardConsistentInvariant::holds(&log));
    }
}
