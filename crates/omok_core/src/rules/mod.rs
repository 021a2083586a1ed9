//! Game rules for five-in-a-row.
//!
//! Pure functions over the move log and the projected board. Rules are kept
//! apart from storage so the session layer can compose them freely.

pub mod projector;
pub mod validator;
pub mod win;

pub use projector::{apply_one, project};
pub use validator::{Candidate, Players, ValidationError, validate};
pub use win::{WIN_LENGTH, check_win, run_length};
