//! Ordered, append-only log of committed entries for one game.

use super::moves::{GameId, Move};
use super::types::{Position, Stone};
use derive_more::Display;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Reasons an entry cannot be appended.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum MoveLogError {
    /// The entry does not continue the contiguous sequence.
    #[display("Expected move order {}, got {}", expected, got)]
    OrderGap {
        /// Next order the log accepts.
        expected: u32,
        /// Order that was offered.
        got: u32,
    },

    /// The move order is already in the log.
    #[display("Move order {} already committed", _0)]
    DuplicateOrder(u32),

    /// The cell is already occupied by an earlier entry.
    #[display("Position {} already occupied", _0)]
    PositionTaken(Position),

    /// The entry belongs to a different game.
    #[display("Move for game {} offered to log of game {}", got, expected)]
    ForeignGame {
        /// Game of this log.
        expected: GameId,
        /// Game of the offered entry.
        got: GameId,
    },
}

impl std::error::Error for MoveLogError {}

/// Committed entries of one game, contiguous from move-order 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveLog {
    game_id: GameId,
    moves: Vec<Move>,
    occupied: HashSet<Position>,
}

impl MoveLog {
    /// Creates an empty log.
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            moves: Vec::new(),
            occupied: HashSet::new(),
        }
    }

    /// Rebuilds a log from entries in any order.
    ///
    /// # Errors
    ///
    /// Returns [`MoveLogError`] if, once sorted, the entries are not a valid log.
    #[instrument(skip(moves))]
    pub fn from_moves(
        game_id: GameId,
        moves: impl IntoIterator<Item = Move>,
    ) -> Result<Self, MoveLogError> {
        let mut sorted: Vec<Move> = moves.into_iter().collect();
        sorted.sort_by_key(Move::move_order);

        let mut log = Self::new(game_id);
        for mv in sorted {
            log.append(mv)?;
        }
        debug!(game_id, len = log.len(), "Rebuilt move log");
        Ok(log)
    }

    /// Appends the next entry.
    ///
    /// # Errors
    ///
    /// Returns [`MoveLogError`] if the entry's order is not exactly
    /// `len() + 1`, its cell is occupied, or it belongs to another game.
    pub fn append(&mut self, mv: Move) -> Result<(), MoveLogError> {
        if mv.game_id() != self.game_id {
            return Err(MoveLogError::ForeignGame {
                expected: self.game_id,
                got: mv.game_id(),
            });
        }
        if self.contains_order(mv.move_order()) {
            return Err(MoveLogError::DuplicateOrder(mv.move_order()));
        }
        if mv.move_order() != self.next_order() {
            return Err(MoveLogError::OrderGap {
                expected: self.next_order(),
                got: mv.move_order(),
            });
        }
        if let Some(position) = mv.position() {
            if !self.occupied.insert(position) {
                return Err(MoveLogError::PositionTaken(position));
            }
        }
        self.moves.push(mv);
        Ok(())
    }

    /// Game this log belongs to.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Entries in move-order.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// True when nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Order the next committed entry must carry.
    pub fn next_order(&self) -> u32 {
        self.moves.len() as u32 + 1
    }

    /// True if `move_order` has already been applied.
    pub fn contains_order(&self, move_order: u32) -> bool {
        move_order >= 1 && move_order as usize <= self.moves.len()
    }

    /// Color on turn.
    pub fn turn(&self) -> Stone {
        Stone::to_move(self.moves.len())
    }

    /// Most recently committed entry.
    pub fn last(&self) -> Option<&Move> {
        self.moves.last()
    }
}
