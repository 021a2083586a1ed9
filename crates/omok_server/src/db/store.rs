//! [`GameStore`] backed by SQLite, with a polling change feed.

use async_trait::async_trait;
use omok_core::{GameId, Move, MoveKind, PlayerId, Position};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, GameRepository};
use crate::store::{FeedEvent, Game, GameStore, StoreError, Subscription};

/// Persistent store shared by every process pointed at the same file.
///
/// SQLite has no push notifications, so each subscription polls for
/// entries above the highest order it has delivered. Delivery is
/// at-least-once: the first poll replays the whole log.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    repository: GameRepository,
    poll_interval: Duration,
}

impl SqliteStore {
    /// Opens the database at `db_path`, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is invalid or migrations fail.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn open(db_path: String, poll_interval: Duration) -> Result<Self, DbError> {
        let repository = GameRepository::new(db_path)?;
        repository.migrate()?;
        info!(?poll_interval, "SQLite store ready");
        Ok(Self {
            repository,
            poll_interval,
        })
    }

    /// The underlying repository.
    pub fn repository(&self) -> &GameRepository {
        &self.repository
    }

    /// Runs a repository call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&GameRepository) -> Result<T, StoreError> + Send + 'static,
    {
        let repository = self.repository.clone();
        tokio::task::spawn_blocking(move || f(&repository)).await?
    }
}

#[async_trait]
impl GameStore for SqliteStore {
    #[instrument(skip(self))]
    async fn create_game(&self, title: &str, black_player: &str) -> Result<Game, StoreError> {
        let (title, black_player) = (title.to_string(), black_player.to_string());
        self.blocking(move |repo| Ok(repo.create_game(&title, &black_player)?))
            .await
    }

    #[instrument(skip(self))]
    async fn join_game(&self, game_id: GameId, player_id: &str) -> Result<Game, StoreError> {
        let player_id: PlayerId = player_id.to_string();
        self.blocking(move |repo| repo.join_game(game_id, &player_id))
            .await
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<Game>, StoreError> {
        self.blocking(|repo| Ok(repo.list_games()?)).await
    }

    #[instrument(skip(self))]
    async fn get_game(&self, game_id: GameId) -> Result<Game, StoreError> {
        self.blocking(move |repo| repo.get_game(game_id)).await
    }

    #[instrument(skip(self))]
    async fn list_moves(&self, game_id: GameId) -> Result<Vec<Move>, StoreError> {
        self.blocking(move |repo| {
            repo.get_game(game_id)?;
            Ok(repo.moves_after(game_id, 0)?)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn commit_move(
        &self,
        game_id: GameId,
        position: Position,
        move_order: u32,
    ) -> Result<Move, StoreError> {
        self.blocking(move |repo| repo.commit(game_id, move_order, MoveKind::Place(position)))
            .await
    }

    #[instrument(skip(self))]
    async fn commit_forfeit(&self, game_id: GameId, move_order: u32) -> Result<Move, StoreError> {
        self.blocking(move |repo| repo.commit(game_id, move_order, MoveKind::Forfeit))
            .await
    }

    #[instrument(skip(self))]
    async fn subscribe_moves(&self, game_id: GameId) -> Result<Subscription, StoreError> {
        self.get_game(game_id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let repository = self.repository.clone();
        let mut ticker = tokio::time::interval(self.poll_interval);

        let task = tokio::spawn(async move {
            let mut high_water = 0u32;
            let mut white: Option<PlayerId> = None;
            loop {
                ticker.tick().await;
                let repo = repository.clone();
                let polled = tokio::task::spawn_blocking(move || {
                    let game = repo.get_game(game_id)?;
                    let moves = repo.moves_after(game_id, high_water)?;
                    Ok::<_, StoreError>((game, moves))
                })
                .await;

                let (game, moves) = match polled {
                    Ok(Ok(polled)) => polled,
                    Ok(Err(e)) => {
                        warn!(game_id, error = %e, "Feed poll failed");
                        let _ = tx.send(FeedEvent::Dropped);
                        return;
                    }
                    Err(e) => {
                        warn!(game_id, error = %e, "Feed poll task failed");
                        let _ = tx.send(FeedEvent::Dropped);
                        return;
                    }
                };

                if game.white_player() != &white {
                    white = game.white_player().clone();
                    if tx.send(FeedEvent::GameUpdated(game)).is_err() {
                        return;
                    }
                }
                for mv in moves {
                    high_water = high_water.max(mv.move_order());
                    if tx.send(FeedEvent::Committed(mv)).is_err() {
                        debug!(game_id, "Subscriber gone, stopping feed");
                        return;
                    }
                }
            }
        });

        debug!(game_id, "Polling feed started");
        Ok(Subscription::with_task(rx, task))
    }
}
