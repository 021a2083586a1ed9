//! Contiguous order invariant: move orders run 1, 2, 3, ... with no gaps.

use super::super::MoveLog;
use super::Invariant;

/// Invariant: move orders form the sequence `1..=len` and every entry
/// belongs to the log's game.
pub struct ContiguousOrderInvariant;

impl Invariant<MoveLog> for ContiguousOrderInvariant {
    fn holds(log: &MoveLog) -> bool {
        log.moves()
            .iter()
            .enumerate()
            .all(|(i, mv)| mv.move_order() as usize == i + 1 && mv.game_id() == log.game_id())
    }

    fn description() -> &'static str {
        "Move orders are contiguous from 1 within a single game"
    }
}
