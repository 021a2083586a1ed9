//! Advisory move validation.
//!
//! Runs against a possibly stale local view before a candidate is sent to
//! the store. The store's commit decision is the authoritative one.

use super::super::{Board, PlayerId, Position, Stone};
use derive_getters::Getters;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A proposed stone placement.
#[derive(Debug, Clone, PartialEq, Eq, Getters, derive_new::new)]
pub struct Candidate {
    position: Position,
    submitter: PlayerId,
}

/// Players seated at a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_new::new)]
pub struct Players {
    black: PlayerId,
    white: Option<PlayerId>,
}

impl Players {
    /// Player bound to `stone`, if that seat is filled.
    pub fn seat(&self, stone: Stone) -> Option<&PlayerId> {
        match stone {
            Stone::Black => Some(&self.black),
            Stone::White => self.white.as_ref(),
        }
    }

    /// Color played by `player`, if seated.
    pub fn color_of(&self, player: &str) -> Option<Stone> {
        if self.black == player {
            Some(Stone::Black)
        } else if self.white.as_deref() == Some(player) {
            Some(Stone::White)
        } else {
            None
        }
    }

    /// True once both seats are filled.
    pub fn is_full(&self) -> bool {
        self.white.is_some()
    }

    /// Fills the white seat.
    pub fn seat_white(&mut self, white: PlayerId) {
        self.white = Some(white);
    }
}

/// Why a candidate was rejected locally.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ValidationError {
    /// The cell already holds a stone.
    #[display("Cell {} is already occupied", _0)]
    OccupiedCell(Position),

    /// The submitter is not the player bound to the color on turn.
    #[display("Not your turn: {} to move", _0)]
    NotYourTurn(Stone),

    /// The white seat is empty, so the game has not started.
    #[display("Waiting for an opponent to join")]
    NoOpponent,

    /// A win has already been recorded.
    #[display("Game is already over")]
    GameOver,
}

impl std::error::Error for ValidationError {}

/// Checks a candidate against the current derived state.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, checking in order: game
/// over, missing opponent, occupied cell, wrong turn.
#[instrument(skip(board, players), fields(position = %candidate.position(), submitter = %candidate.submitter()))]
pub fn validate(
    candidate: &Candidate,
    board: &Board,
    turn: Stone,
    players: &Players,
    finished: bool,
) -> Result<(), ValidationError> {
    if finished {
        return Err(ValidationError::GameOver);
    }
    if !players.is_full() {
        return Err(ValidationError::NoOpponent);
    }
    if !board.is_empty(*candidate.position()) {
        return Err(ValidationError::OccupiedCell(*candidate.position()));
    }
    if players.seat(turn) != Some(candidate.submitter()) {
        return Err(ValidationError::NotYourTurn(turn));
    }
    debug!(stone = %turn, "Candidate accepted locally");
    Ok(())
}
