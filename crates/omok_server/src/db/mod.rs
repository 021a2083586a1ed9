//! SQLite persistence for games and move logs.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only
mod store;

use diesel_migrations::{EmbeddedMigrations, embed_migrations};

pub use error::{DbError, DbErrorKind};
pub use models::{GameRow, MoveRow, NewGameRow, NewMoveRow};
pub use repository::GameRepository;
pub use store::SqliteStore;

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
