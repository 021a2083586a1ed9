//! Game sessions.
//!
//! A [`GameSession`] is a handle to one game's actor task. The actor owns
//! the move log, the derived board, the [`TurnClock`](crate::clock::TurnClock)
//! and the [`SyncChannel`](crate::sync::SyncChannel), and processes exactly
//! one input at a time: a local submit, a feed event, or a clock tick.
//! Callers read state through a watch channel and hear about notable
//! transitions through a broadcast of [`SessionNotice`]s.

mod actor;

use actor::{SessionActor, SessionInput};
use derive_getters::Getters;
use derive_more::Display;
use omok_core::{Board, GameId, Move, PlayerId, Players, Position, Stone, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::clock::{ClockState, TurnClock};
use crate::config::SessionConfig;
use crate::store::{GameStore, Identity, StoreError};
use crate::sync::SyncChannel;

const NOTICE_CAPACITY: usize = 64;

/// Lifecycle of a session as seen by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SessionStatus {
    /// White seat still empty.
    #[display("waiting for opponent")]
    WaitingForOpponent,
    /// Both seats filled, no winner yet.
    #[display("in progress")]
    InProgress,
    /// Five in a row was made.
    #[display("won by {}", _0)]
    Won(Stone),
    /// The session was torn down.
    #[display("closed")]
    Closed,
}

/// State of the link to the store's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Connection {
    /// Subscribed and in sync.
    #[display("live")]
    Live,
    /// Rebuilding from the store; local writes are refused.
    #[display("reconnecting")]
    Reconnecting,
}

/// Snapshot published after every processed input.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SessionView {
    board: Board,
    turn: Stone,
    clock: ClockState,
    status: SessionStatus,
    move_count: usize,
    connection: Connection,
    players: Players,
}

impl SessionView {
    pub(crate) fn new(
        board: Board,
        turn: Stone,
        clock: ClockState,
        status: SessionStatus,
        move_count: usize,
        connection: Connection,
        players: Players,
    ) -> Self {
        Self {
            board,
            turn,
            clock,
            status,
            move_count,
            connection,
            players,
        }
    }
}

/// Notable transitions, delivered to every notice subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionNotice {
    /// The white seat was filled.
    #[display("{} joined as white", _0)]
    OpponentJoined(PlayerId),
    /// The color ran out of time and lost its turn.
    #[display("{} forfeited the turn", _0)]
    Forfeited(Stone),
    /// Terminal. Emitted at most once per session.
    #[display("{} wins", _0)]
    Won(Stone),
    /// The feed was lost; state is being rebuilt from the store.
    #[display("reconnecting")]
    Reconnecting,
    /// State was rebuilt from the store.
    #[display("resynchronized")]
    Resynchronized,
}

/// Errors surfaced by [`GameSession`].
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    /// Nobody is signed in.
    #[display("No signed-in player")]
    Auth,

    /// Rejected locally before reaching the store.
    #[display("{}", _0)]
    Validation(ValidationError),

    /// The store gave the slot to somebody else; state is being refetched.
    #[display("Move order {} was taken by another commit", move_order)]
    Conflict {
        /// Order the candidate asked for.
        move_order: u32,
    },

    /// Writes are refused until the session is back in sync.
    #[display("Reconnecting to the game feed")]
    Reconnecting,

    /// The store failed.
    #[display("{}", _0)]
    Store(StoreError),

    /// The session has been torn down.
    #[display("Session closed")]
    Closed,
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Validation(err) => Some(err),
            SessionError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Validation(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

/// Handle to one game's session.
///
/// Dropping the handle without [`GameSession::teardown`] aborts the actor,
/// which releases the clock and subscription just the same.
#[derive(Debug)]
pub struct GameSession {
    game_id: GameId,
    player: PlayerId,
    inputs: mpsc::UnboundedSender<SessionInput>,
    view: watch::Receiver<SessionView>,
    notices: broadcast::Sender<SessionNotice>,
    task: Option<JoinHandle<()>>,
}

impl GameSession {
    /// Connects to `game_id` as the signed-in player and starts the actor.
    ///
    /// # Errors
    ///
    /// [`SessionError::Auth`] if nobody is signed in, or
    /// [`SessionError::Store`] if the game cannot be loaded.
    #[instrument(skip(store, identity, config))]
    pub async fn open(
        store: Arc<dyn GameStore>,
        identity: &dyn Identity,
        game_id: GameId,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let player = identity.current_user().ok_or(SessionError::Auth)?;

        let (sync, game) = SyncChannel::connect(
            Arc::clone(&store),
            game_id,
            config.gap_timeout(),
            config.resync_backoff(),
        )
        .await?;
        let clock = TurnClock::new(*config.turn_allowance(), config.tick_interval());

        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let (actor, view) = SessionActor::new(store, sync, clock, game, notices.clone());
        let (inputs, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(actor.run(rx));

        info!(game_id, player = %player, "Session opened");
        Ok(Self {
            game_id,
            player,
            inputs,
            view,
            notices,
            task: Some(task),
        })
    }

    /// Game this session follows.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Player the session was opened for.
    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    /// Validates `position` for `submitter` and forwards it to the store.
    ///
    /// Success means the store accepted the entry; the board changes only
    /// once the commit comes back through the feed.
    ///
    /// # Errors
    ///
    /// Validation failures, [`SessionError::Conflict`] if the store gave the
    /// slot away, [`SessionError::Reconnecting`] while resynchronizing, and
    /// [`SessionError::Closed`] after teardown.
    #[instrument(skip(self), fields(game_id = self.game_id))]
    pub async fn submit_move(
        &self,
        position: Position,
        submitter: &str,
    ) -> Result<Move, SessionError> {
        let (reply, response) = oneshot::channel();
        self.inputs
            .send(SessionInput::Submit {
                position,
                submitter: submitter.to_string(),
                reply,
            })
            .map_err(|_| SessionError::Closed)?;
        let result = response.await.map_err(|_| SessionError::Closed)?;
        match &result {
            Ok(mv) => debug!(move_order = mv.move_order(), "Submit accepted by store"),
            Err(e) => debug!(error = %e, "Submit rejected"),
        }
        result
    }

    /// [`submit_move`](Self::submit_move) on behalf of the session's own player.
    pub async fn place(&self, position: Position) -> Result<Move, SessionError> {
        self.submit_move(position, &self.player).await
    }

    /// Board derived from the applied log.
    pub fn current_board(&self) -> Board {
        *self.view.borrow().board()
    }

    /// Color to move.
    pub fn current_turn(&self) -> Stone {
        *self.view.borrow().turn()
    }

    /// Clock state.
    pub fn current_clock(&self) -> ClockState {
        *self.view.borrow().clock()
    }

    /// Latest snapshot.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that wakes on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Subscribes to notices emitted from now on.
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Stops the clock, releases the subscription and ends the actor.
    ///
    /// Idempotent. Once this returns no timer or feed callback remains.
    #[instrument(skip(self), fields(game_id = self.game_id))]
    pub async fn teardown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let (reply, done) = oneshot::channel();
        if self.inputs.send(SessionInput::Teardown { reply }).is_ok() {
            let _ = done.await;
        }
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Session task ended abnormally");
            }
        }
        info!("Session torn down");
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
