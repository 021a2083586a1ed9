//! Unique positions invariant: a cell is claimed at most once per game.

use super::super::MoveLog;
use super::Invariant;
use std::collections::HashSet;

/// Invariant: no two placements share a cell.
pub struct UniquePositionsInvariant;

impl Invariant<MoveLog> for UniquePositionsInvariant {
    fn holds(log: &MoveLog) -> bool {
        let mut seen = HashSet::new();
        log.moves()
            .iter()
            .filter_map(|mv| mv.position())
            .all(|position| seen.insert(position))
    }

    fn description() -> &'static str {
        "A position is never reassigned within a game"
    }
}
