//! Store error types.

use crate::db::DbError;
use derive_more::Display;
use omok_core::GameId;

/// Errors reported by a [`GameStore`](super::GameStore).
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreError {
    /// Another entry already holds this move order or cell, or the order is
    /// not the next one in the game.
    #[display("Concurrency conflict at move order {}", move_order)]
    ConcurrencyConflict {
        /// Order the rejected commit asked for.
        move_order: u32,
    },

    /// No such game.
    #[display("Game {} not found", _0)]
    NotFound(GameId),

    /// The white seat cannot be taken by this player.
    #[display("Join rejected: {}", _0)]
    JoinRejected(String),

    /// The store could not be reached or the feed broke.
    #[display("Transport error: {}", _0)]
    Transport(String),

    /// Persistence layer failure.
    #[display("{}", _0)]
    Db(DbError),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        StoreError::Db(err)
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Db(DbError::from(err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Transport(format!("Store task failed: {}", err))
    }
}
