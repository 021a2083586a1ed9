//! Omok server - realtime five-in-a-row sessions over a shared store
//!
//! Builds on `omok_core`'s pure rules: every client derives its board from
//! the store's move log, observes commits through a change feed, and times
//! each turn with a clock whose expiry is itself committed to the store.
//!
//! # Architecture
//!
//! - **Store**: [`GameStore`] contract, in-memory and SQLite implementations
//! - **Sync**: [`SyncChannel`] reconciles the at-least-once, unordered feed
//! - **Clock**: [`TurnClock`] with a single cancellable timer
//! - **Session**: [`GameSession`] actor processing one input at a time
//!
//! # Example
//!
//! ```no_run
//! use omok_server::{FixedIdentity, GameSession, GameStore, MemoryStore, SessionConfig};
//! use omok_core::Position;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let game = store.create_game("friendly", "alice").await?;
//! store.join_game(*game.id(), "bob").await?;
//!
//! let identity = FixedIdentity::signed_in("alice");
//! let session = GameSession::open(store, &identity, *game.id(), &SessionConfig::default()).await?;
//! session.place(Position::from_row_col(7, 7)?).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod config;
mod db;
mod session;
mod store;
mod sync;

// Crate-level exports - Clock
pub use clock::{ClockState, TurnClock};

// Crate-level exports - Configuration
pub use config::{ConfigError, SessionConfig};

// Crate-level exports - Persistence
pub use db::{DbError, DbErrorKind, GameRepository, MIGRATIONS, SqliteStore};

// Crate-level exports - Session
pub use session::{
    Connection, GameSession, SessionError, SessionNotice, SessionStatus, SessionView,
};

// Crate-level exports - Store contract
pub use store::{
    FeedEvent, FixedIdentity, Game, GameStore, Identity, MemoryStore, StoreError, Subscription,
};

// Crate-level exports - Sync
pub use sync::{Reconciled, Reconciler, SyncChannel, SyncSignal};
