//! Committed log entries.
//!
//! Entries are domain events assigned a move-order by the store at commit
//! time. A client never picks the definitive order; it only proposes one.

use super::types::{Position, Stone};
use serde::{Deserialize, Serialize};

/// Store-assigned game identifier.
pub type GameId = i32;

/// Opaque player identifier supplied by the identity collaborator.
pub type PlayerId = String;

/// What a committed entry did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// A stone placed on a cell.
    Place(Position),
    /// The player on turn ran out of time; the turn passes without a stone.
    Forfeit,
}

/// A committed entry in a game's move log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct Move {
    game_id: GameId,
    move_order: u32,
    kind: MoveKind,
}

impl Move {
    /// Creates a stone placement.
    pub fn place(game_id: GameId, move_order: u32, position: Position) -> Self {
        Self::new(game_id, move_order, MoveKind::Place(position))
    }

    /// Creates a turn forfeiture.
    pub fn forfeit(game_id: GameId, move_order: u32) -> Self {
        Self::new(game_id, move_order, MoveKind::Forfeit)
    }

    /// Game this entry belongs to.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// 1-based commit order within the game.
    pub fn move_order(&self) -> u32 {
        self.move_order
    }

    /// Placement or forfeiture.
    pub fn kind(&self) -> MoveKind {
        self.kind
    }

    /// Cell occupied by this entry, if it placed a stone.
    pub fn position(&self) -> Option<Position> {
        match self.kind {
            MoveKind::Place(position) => Some(position),
            MoveKind::Forfeit => None,
        }
    }

    /// Color of the player this entry belongs to.
    pub fn stone(&self) -> Stone {
        Stone::for_move_order(self.move_order)
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            MoveKind::Place(position) => {
                write!(f, "#{} {} -> {}", self.move_order, self.stone(), position)
            }
            MoveKind::Forfeit => write!(f, "#{} {} forfeits", self.move_order, self.stone()),
        }
    }
}
