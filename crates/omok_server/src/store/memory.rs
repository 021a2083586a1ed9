//! In-process store for tests and single-process play.

use super::{FeedEvent, Game, GameStore, StoreError, Subscription};
use async_trait::async_trait;
use omok_core::{GameId, Move, MoveKind, Position};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: GameId,
    games: BTreeMap<GameId, Game>,
    moves: HashMap<GameId, Vec<Move>>,
    subscribers: HashMap<GameId, Vec<mpsc::UnboundedSender<FeedEvent>>>,
    muted: HashSet<GameId>,
}

impl MemoryState {
    fn game(&self, game_id: GameId) -> Result<&Game, StoreError> {
        self.games.get(&game_id).ok_or(StoreError::NotFound(game_id))
    }

    /// Delivers to every live subscriber, pruning closed ones.
    fn publish(&mut self, game_id: GameId, event: FeedEvent) {
        if self.muted.contains(&game_id) {
            debug!(game_id, ?event, "Feed muted, event not delivered");
            return;
        }
        if let Some(subscribers) = self.subscribers.get_mut(&game_id) {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn commit(&mut self, game_id: GameId, move_order: u32, kind: MoveKind) -> Result<Move, StoreError> {
        self.game(game_id)?;
        let log = self.moves.entry(game_id).or_default();

        let taken = match kind {
            MoveKind::Place(position) => log.iter().any(|mv| mv.position() == Some(position)),
            MoveKind::Forfeit => false,
        };
        if taken || move_order as usize != log.len() + 1 {
            warn!(game_id, move_order, ?kind, "Commit rejected");
            return Err(StoreError::ConcurrencyConflict { move_order });
        }

        let mv = Move::new(game_id, move_order, kind);
        log.push(mv);
        info!(game_id, move_order, ?kind, "Entry committed");
        self.publish(game_id, FeedEvent::Committed(mv));
        Ok(mv)
    }
}

/// Store kept entirely in memory, broadcasting commits to in-process
/// subscribers.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating in-memory store");
        Self::default()
    }

    /// Simulates a transport loss: every subscriber of the game receives
    /// [`FeedEvent::Dropped`] and is disconnected.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, game_id: GameId) {
        let mut state = self.state.lock().await;
        if let Some(subscribers) = state.subscribers.remove(&game_id) {
            info!(game_id, count = subscribers.len(), "Dropping subscribers");
            for tx in subscribers {
                let _ = tx.send(FeedEvent::Dropped);
            }
        }
    }

    /// Stops (or resumes) feed delivery for a game. Commits still succeed.
    #[instrument(skip(self))]
    pub async fn set_muted(&self, game_id: GameId, muted: bool) {
        let mut state = self.state.lock().await;
        if muted {
            state.muted.insert(game_id);
        } else {
            state.muted.remove(&game_id);
        }
    }

    /// Delivers an already committed entry to subscribers again.
    #[instrument(skip(self))]
    pub async fn redeliver(&self, game_id: GameId, move_order: u32) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let mv = state
            .moves
            .get(&game_id)
            .and_then(|log| log.get(move_order.checked_sub(1)? as usize))
            .copied()
            .ok_or(StoreError::NotFound(game_id))?;
        state.publish(game_id, FeedEvent::Committed(mv));
        Ok(())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    #[instrument(skip(self))]
    async fn create_game(&self, title: &str, black_player: &str) -> Result<Game, StoreError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let game = Game::new(
            state.next_id,
            title.to_string(),
            black_player.to_string(),
            None,
            chrono::Utc::now().naive_utc(),
        );
        state.games.insert(*game.id(), game.clone());
        info!(game_id = game.id(), "Game created");
        Ok(game)
    }

    #[instrument(skip(self))]
    async fn join_game(&self, game_id: GameId, player_id: &str) -> Result<Game, StoreError> {
        let mut state = self.state.lock().await;
        let game = state.game(game_id)?.clone();

        if game.black_player() == player_id {
            return Err(StoreError::JoinRejected(
                "black player cannot take the white seat".to_string(),
            ));
        }
        match game.white_player() {
            Some(white) if white == player_id => return Ok(game),
            Some(_) => {
                return Err(StoreError::JoinRejected("white seat already taken".to_string()));
            }
            None => {}
        }

        let joined = Game::new(
            game_id,
            game.title().clone(),
            game.black_player().clone(),
            Some(player_id.to_string()),
            *game.created_at(),
        );
        state.games.insert(game_id, joined.clone());
        info!(game_id, player_id, "White seat filled");
        state.publish(game_id, FeedEvent::GameUpdated(joined.clone()));
        Ok(joined)
    }

    #[instrument(skip(self))]
    async fn list_games(&self) -> Result<Vec<Game>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.games.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn get_game(&self, game_id: GameId) -> Result<Game, StoreError> {
        let state = self.state.lock().await;
        state.game(game_id).cloned()
    }

    #[instrument(skip(self))]
    async fn list_moves(&self, game_id: GameId) -> Result<Vec<Move>, StoreError> {
        let state = self.state.lock().await;
        state.game(game_id)?;
        Ok(state.moves.get(&game_id).cloned().unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn commit_move(
        &self,
        game_id: GameId,
        position: Position,
        move_order: u32,
    ) -> Result<Move, StoreError> {
        let mut state = self.state.lock().await;
        state.commit(game_id, move_order, MoveKind::Place(position))
    }

    #[instrument(skip(self))]
    async fn commit_forfeit(&self, game_id: GameId, move_order: u32) -> Result<Move, StoreError> {
        let mut state = self.state.lock().await;
        state.commit(game_id, move_order, MoveKind::Forfeit)
    }

    #[instrument(skip(self))]
    async fn subscribe_moves(&self, game_id: GameId) -> Result<Subscription, StoreError> {
        let mut state = self.state.lock().await;
        state.game(game_id)?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.entry(game_id).or_default().push(tx);
        debug!(game_id, "Subscriber registered");
        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(index: i64) -> Position {
        Position::new(index).unwrap()
    }

    #[tokio::test]
    async fn test_commit_requires_next_order() {
        let store = MemoryStore::new();
        let game = store.create_game("t", "alice").await.unwrap();
        let err = store.commit_move(*game.id(), pos(0), 2).await.unwrap_err();
        assert_eq!(err, StoreError::ConcurrencyConflict { move_order: 2 });
        assert!(store.commit_move(*game.id(), pos(0), 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_committer_wins() {
        let store = MemoryStore::new();
        let id = *store.create_game("t", "alice").await.unwrap().id();
        store.commit_move(id, pos(5), 1).await.unwrap();
        assert!(store.commit_move(id, pos(6), 1).await.is_err());
        assert!(store.commit_forfeit(id, 1).await.is_err());
        assert!(store.commit_move(id, pos(5), 2).await.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_sees_commit() {
        let store = MemoryStore::new();
        let id = *store.create_game("t", "alice").await.unwrap().id();
        let mut sub = store.subscribe_moves(id).await.unwrap();
        let mv = store.commit_move(id, pos(112), 1).await.unwrap();
        assert_eq!(sub.recv().await, Some(FeedEvent::Committed(mv)));
    }

    #[tokio::test]
    async fn test_join_rules() {
        let store = MemoryStore::new();
        let id = *store.create_game("t", "alice").await.unwrap().id();
        assert!(matches!(
            store.join_game(id, "alice").await,
            Err(StoreError::JoinRejected(_))
        ));
        let joined = store.join_game(id, "bob").await.unwrap();
        assert_eq!(joined.white_player().as_deref(), Some("bob"));
        assert!(store.join_game(id, "bob").await.is_ok());
        assert!(matches!(
            store.join_game(id, "carol").await,
            Err(StoreError::JoinRejected(_))
        ));
    }
}
