//! Pure five-in-a-row game logic.
//!
//! The board is never stored. It is projected from an append-only
//! [`MoveLog`] whose entries carry store-assigned move orders; stone color
//! follows move-order parity (odd Black, even White).
//!
//! # Architecture
//!
//! - **Types**: [`Stone`], [`Cell`], [`Position`], [`Board`]
//! - **Log**: [`Move`], [`MoveLog`]
//! - **Rules**: [`project`], [`check_win`], [`validate`]
//! - **Invariants**: checks that must hold after every applied entry
//!
//! # Example
//!
//! ```
//! use omok_core::{Move, MoveLog, Position, check_win, project};
//!
//! let cells = [0, 15, 1, 16, 2, 17, 3, 18, 4];
//! let moves = cells
//!     .iter()
//!     .enumerate()
//!     .map(|(i, &c)| Move::place(1, i as u32 + 1, Position::new(c).unwrap()));
//! let log = MoveLog::from_moves(1, moves).unwrap();
//! let board = project(log.moves());
//! assert!(check_win(Position::new(4).unwrap(), &board));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod invariants;
mod move_log;
mod moves;
pub mod rules;
mod types;

pub use move_log::{MoveLog, MoveLogError};
pub use moves::{GameId, Move, MoveKind, PlayerId};
pub use rules::{
    Candidate, Players, ValidationError, WIN_LENGTH, apply_one, check_win, project, run_length,
    validate,
};
pub use types::{BOARD_SIZE, Board, CELL_COUNT, Cell, Position, PositionError, Stone};
