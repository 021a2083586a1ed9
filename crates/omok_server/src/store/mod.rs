//! The external record store and its realtime change feed.
//!
//! The store is the single source of truth for ordering: it assigns move
//! orders, enforces that a cell or order is claimed once, and broadcasts
//! every commit to the game's subscribers at least once, in no guaranteed
//! order.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use derive_getters::Getters;
use omok_core::{GameId, Move, PlayerId, Players, Position};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A game record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_new::new)]
pub struct Game {
    id: GameId,
    title: String,
    black_player: PlayerId,
    white_player: Option<PlayerId>,
    created_at: NaiveDateTime,
}

impl Game {
    /// Seats of this game.
    pub fn players(&self) -> Players {
        Players::new(self.black_player.clone(), self.white_player.clone())
    }

    /// True once a second participant holds the white seat.
    pub fn is_startable(&self) -> bool {
        self.white_player.is_some()
    }
}

/// Something a subscriber hears about a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// An entry was committed.
    Committed(Move),
    /// The game record changed (the white seat was filled).
    GameUpdated(Game),
    /// The feed lost its connection; events may have been missed.
    Dropped,
}

/// A live subscription to one game's feed.
///
/// Dropping the subscription stops delivery and releases any background
/// task feeding it.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<FeedEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps a receiver fed by someone else.
    pub fn new(events: mpsc::UnboundedReceiver<FeedEvent>) -> Self {
        Self { events, task: None }
    }

    /// Wraps a receiver fed by `task`, which is aborted with the subscription.
    pub fn with_task(events: mpsc::UnboundedReceiver<FeedEvent>, task: JoinHandle<()>) -> Self {
        Self {
            events,
            task: Some(task),
        }
    }

    /// Next event, or `None` once the sender side is gone.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Persistent record store with realtime change notification.
#[async_trait]
pub trait GameStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new game with the white seat empty.
    async fn create_game(&self, title: &str, black_player: &str) -> Result<Game, StoreError>;

    /// Seats `player_id` as white.
    ///
    /// A no-op if that player already holds the seat. Rejected if the player
    /// is black or the seat belongs to somebody else.
    async fn join_game(&self, game_id: GameId, player_id: &str) -> Result<Game, StoreError>;

    /// All games, oldest first.
    async fn list_games(&self) -> Result<Vec<Game>, StoreError>;

    /// One game record.
    async fn get_game(&self, game_id: GameId) -> Result<Game, StoreError>;

    /// Every committed entry of a game in move-order.
    async fn list_moves(&self, game_id: GameId) -> Result<Vec<Move>, StoreError>;

    /// Atomically commits a stone at `move_order`.
    ///
    /// Fails with [`StoreError::ConcurrencyConflict`] if the cell or the order
    /// is taken, or `move_order` is not the game's next order.
    async fn commit_move(
        &self,
        game_id: GameId,
        position: Position,
        move_order: u32,
    ) -> Result<Move, StoreError>;

    /// Atomically commits a turn forfeiture at `move_order`.
    async fn commit_forfeit(&self, game_id: GameId, move_order: u32) -> Result<Move, StoreError>;

    /// Subscribes to the game's feed until the subscription is dropped.
    async fn subscribe_moves(&self, game_id: GameId) -> Result<Subscription, StoreError>;
}

/// Source of the signed-in player.
pub trait Identity: Send + Sync {
    /// The current player, if anyone is signed in.
    fn current_user(&self) -> Option<PlayerId>;
}

/// Identity resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedIdentity(Option<PlayerId>);

impl FixedIdentity {
    /// Signed in as `player`.
    pub fn signed_in(player: impl Into<PlayerId>) -> Self {
        Self(Some(player.into()))
    }

    /// Nobody signed in.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl Identity for FixedIdentity {
    fn current_user(&self) -> Option<PlayerId> {
        self.0.clone()
    }
}
