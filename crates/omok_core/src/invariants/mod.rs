//! First-class invariants for the move log.
//!
//! Invariants are logical properties that must hold throughout a game.
//! They are testable independently and are asserted by the session layer
//! in debug builds after every applied entry.

pub mod board_consistent;
pub mod contiguous_order;
pub mod unique_positions;

pub use board_consistent::BoardConsistentInvariant;
pub use contiguous_order::ContiguousOrderInvariant;
pub use unique_positions::UniquePositionsInvariant;

/// A logical property that must hold for a given state.
pub trait Invariant<S> {
    /// Checks if the invariant holds for the given state.
    fn holds(state: &S) -> bool;

    /// Human-readable description of the invariant.
    fn description() -> &'static str;
}

/// Violation of an invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub description: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// A set of invariants that can be checked together.
pub trait InvariantSet<S> {
    /// Checks all invariants in the set.
    ///
    /// Returns Ok(()) if all invariants hold, or Err with a list of
    /// violations if any invariant fails.
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>>;
}

impl<S, I1, I2, I3> InvariantSet<S> for (I1, I2, I3)
where
    I1: Invariant<S>,
    I2: Invariant<S>,
    I3: Invariant<S>,
{
    fn check_all(state: &S) -> Result<(), Vec<InvariantViolation>> {
        let violations: Vec<InvariantViolation> = [
            (I1::holds(state), I1::description()),
            (I2::holds(state), I2::description()),
            (I3::holds(state), I3::description()),
        ]
        .into_iter()
        .filter(|(holds, _)| !holds)
        .map(|(_, description)| InvariantViolation::new(description))
        .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// All move log invariants as a composable set.
pub type MoveLogInvariants = (
    ContiguousOrderInvariant,
    UniquePositionsInvariant,
    BoardConsistentInvariant,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Move, MoveLog, Position};

    #[test]
    fn test_invariant_set_holds_for_empty_log() {
        assert!(MoveLogInvariants::check_all(&MoveLog::new(1)).is_ok());
    }

    #[test]
    fn test_invariant_set_holds_after_moves() {
        let moves = vec![
            Move::place(1, 1, Position::new(112).unwrap()),
            Move::forfeit(1, 2),
            Move::place(1, 3, Position::new(113).unwrap()),
        ];
        let log = MoveLog::from_moves(1, moves).unwrap();
        assert!(MoveLogInvariants::check_all(&log).is_ok());
    }
}
