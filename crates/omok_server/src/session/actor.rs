//! The single-threaded event loop behind a [`GameSession`](super::GameSession).

use omok_core::invariants::{InvariantSet, MoveLogInvariants};
use omok_core::{
    Board, Candidate, GameId, Move, PlayerId, Players, Position, Stone, apply_one, check_win,
    validate,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

use super::{Connection, SessionError, SessionNotice, SessionStatus, SessionView};
use crate::clock::{ClockState, TurnClock};
use crate::store::{FeedEvent, Game, GameStore, StoreError};
use crate::sync::{Reconciled, SyncChannel, SyncSignal};

/// Requests from the handle.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Submit {
        position: Position,
        submitter: PlayerId,
        reply: oneshot::Sender<Result<Move, SessionError>>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// Whatever woke the loop.
enum Wake {
    Input(Option<SessionInput>),
    Sync(SyncSignal),
    Tick(ClockState),
}

pub(crate) struct SessionActor {
    game_id: GameId,
    store: Arc<dyn GameStore>,
    sync: SyncChannel,
    clock: TurnClock,
    board: Board,
    players: Players,
    winner: Option<Stone>,
    announced: bool,
    connection: Connection,
    closed: bool,
    view: watch::Sender<SessionView>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionActor {
    /// Builds the actor from a freshly connected channel.
    pub(crate) fn new(
        store: Arc<dyn GameStore>,
        sync: SyncChannel,
        clock: TurnClock,
        game: Game,
        notices: broadcast::Sender<SessionNotice>,
    ) -> (Self, watch::Receiver<SessionView>) {
        let players = game.players();
        let initial = SessionView::new(
            Board::new(),
            Stone::Black,
            ClockState::Stopped,
            SessionStatus::WaitingForOpponent,
            0,
            Connection::Live,
            players.clone(),
        );
        let (view, rx) = watch::channel(initial);

        let mut actor = Self {
            game_id: sync.game_id(),
            store,
            sync,
            clock,
            board: Board::new(),
            players,
            winner: None,
            announced: false,
            connection: Connection::Live,
            closed: false,
            view,
            notices,
        };
        actor.rebuild(game);
        actor.publish();
        (actor, rx)
    }

    /// Runs until teardown or until the handle is dropped.
    #[instrument(skip_all, fields(game_id = self.game_id))]
    pub(crate) async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<SessionInput>) {
        info!("Session loop started");
        loop {
            let wake = tokio::select! {
                input = inputs.recv() => Wake::Input(input),
                signal = self.sync.next_signal() => Wake::Sync(signal),
                state = self.clock.next_tick() => Wake::Tick(state),
            };

            match wake {
                Wake::Input(Some(SessionInput::Submit {
                    position,
                    submitter,
                    reply,
                })) => {
                    let result = self.submit(position, submitter).await;
                    self.publish();
                    let _ = reply.send(result);
                }
                Wake::Input(Some(SessionInput::Teardown { reply })) => {
                    self.shutdown();
                    self.publish();
                    let _ = reply.send(());
                    break;
                }
                Wake::Input(None) => {
                    self.shutdown();
                    self.publish();
                    break;
                }
                Wake::Sync(signal) => self.on_signal(signal).await,
                Wake::Tick(state) => self.on_tick(state).await,
            }
            self.publish();
        }
        info!("Session loop ended");
    }

    fn turn(&self) -> Stone {
        self.sync.log().turn()
    }

    async fn submit(&mut self, position: Position, submitter: PlayerId) -> Result<Move, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if self.connection == Connection::Reconnecting {
            return Err(SessionError::Reconnecting);
        }

        let candidate = Candidate::new(position, submitter);
        validate(
            &candidate,
            &self.board,
            self.turn(),
            &self.players,
            self.winner.is_some(),
        )?;

        let move_order = self.sync.log().next_order();
        match self.store.commit_move(self.game_id, position, move_order).await {
            Ok(mv) => Ok(mv),
            Err(StoreError::ConcurrencyConflict { move_order }) => {
                warn!(move_order, %position, "Commit lost the race, refetching");
                self.begin_resync().await;
                Err(SessionError::Conflict { move_order })
            }
            Err(e) => Err(SessionError::Store(e)),
        }
    }

    async fn on_tick(&mut self, state: ClockState) {
        let ClockState::Expired(stone) = state else {
            return;
        };
        let move_order = self.sync.log().next_order();
        match self.store.commit_forfeit(self.game_id, move_order).await {
            Ok(_) => info!(%stone, move_order, "Forfeit committed"),
            Err(StoreError::ConcurrencyConflict { .. }) => {
                debug!(%stone, move_order, "Turn already resolved by another commit");
                self.sync.expect_order(move_order);
            }
            Err(e) => {
                warn!(error = %e, "Forfeit commit failed");
                self.begin_resync().await;
            }
        }
    }

    async fn on_signal(&mut self, signal: SyncSignal) {
        match signal {
            SyncSignal::Event(FeedEvent::Committed(mv)) => match self.sync.offer(mv) {
                Reconciled::Applied(applied) => {
                    for mv in applied {
                        self.after_apply(mv);
                    }
                }
                Reconciled::Rejected(_) => self.begin_resync().await,
                Reconciled::Duplicate | Reconciled::Buffered { .. } | Reconciled::Foreign => {}
            },
            SyncSignal::Event(FeedEvent::GameUpdated(game)) => self.on_game_updated(game),
            SyncSignal::Event(FeedEvent::Dropped) => {
                warn!("Feed dropped");
                self.begin_resync().await;
            }
            SyncSignal::GapExpired => {
                warn!(next = self.sync.log().next_order(), "Gap not closed in time");
                self.begin_resync().await;
            }
            SyncSignal::RetryDue => self.begin_resync().await,
        }
    }

    /// Runs the per-entry pipeline: project, check, detect a win, reset the clock.
    fn after_apply(&mut self, mv: Move) {
        self.board = apply_one(self.board, &mv);
        debug_assert!(
            MoveLogInvariants::check_all(self.sync.log()).is_ok(),
            "move log invariants violated after applying {}",
            mv
        );

        match mv.position() {
            None => {
                info!(stone = %mv.stone(), move_order = mv.move_order(), "Turn forfeited");
                if self.winner.is_none() {
                    self.notify(SessionNotice::Forfeited(mv.stone()));
                }
            }
            Some(position) if self.winner.is_none() && check_win(position, &self.board) => {
                self.declare_winner(mv.stone());
                return;
            }
            Some(position) => {
                debug!(%position, stone = %mv.stone(), move_order = mv.move_order(), "Stone applied");
            }
        }
        self.restart_clock();
    }

    fn on_game_updated(&mut self, game: Game) {
        if *game.id() != self.game_id {
            return;
        }
        if self.players.is_full() {
            return;
        }
        if let Some(white) = game.white_player().clone() {
            info!(white = %white, "Opponent joined");
            self.players.seat_white(white.clone());
            self.notify(SessionNotice::OpponentJoined(white));
            self.restart_clock();
        }
    }

    fn declare_winner(&mut self, stone: Stone) {
        self.winner = Some(stone);
        self.clock.stop();
        self.sync.close();
        if !self.announced {
            self.announced = true;
            info!(%stone, "Game won");
            self.notify(SessionNotice::Won(stone));
        }
    }

    /// Starts a full allowance for the color on turn, or stops the clock
    /// when nobody should be timed.
    fn restart_clock(&mut self) {
        let timed = self.winner.is_none()
            && !self.closed
            && self.players.is_full()
            && self.connection == Connection::Live;
        if timed {
            self.clock.start(self.turn());
        } else {
            self.clock.stop();
        }
    }

    async fn begin_resync(&mut self) {
        if self.winner.is_some() || self.closed {
            return;
        }
        self.clock.stop();
        if self.connection == Connection::Live {
            self.connection = Connection::Reconnecting;
            self.notify(SessionNotice::Reconnecting);
            self.publish();
        }

        match self.sync.resync().await {
            Ok(game) => {
                self.rebuild(game);
                self.notify(SessionNotice::Resynchronized);
            }
            Err(e) => warn!(error = %e, "Still reconnecting"),
        }
    }

    /// Recomputes everything from the channel's log and the game record.
    fn rebuild(&mut self, game: Game) {
        self.players = game.players();
        self.connection = Connection::Live;

        let mut board = Board::new();
        let mut winner = None;
        for mv in self.sync.log().moves() {
            board = apply_one(board, mv);
            if let Some(position) = mv.position() {
                if winner.is_none() && check_win(position, &board) {
                    winner = Some(mv.stone());
                }
            }
        }
        self.board = board;
        debug!(entries = self.sync.log().len(), ?winner, "State rebuilt");

        match winner {
            Some(stone) => self.declare_winner(stone),
            None => self.restart_clock(),
        }
    }

    fn shutdown(&mut self) {
        self.closed = true;
        self.clock.stop();
        self.sync.close();
        info!("Session shut down");
    }

    fn status(&self) -> SessionStatus {
        if self.closed {
            SessionStatus::Closed
        } else if let Some(stone) = self.winner {
            SessionStatus::Won(stone)
        } else if self.players.is_full() {
            SessionStatus::InProgress
        } else {
            SessionStatus::WaitingForOpponent
        }
    }

    fn publish(&self) {
        let view = SessionView::new(
            self.board,
            self.turn(),
            self.clock.state(),
            self.status(),
            self.sync.log().len(),
            self.connection,
            self.players.clone(),
        );
        self.view.send_replace(view);
    }

    fn notify(&self, notice: SessionNotice) {
        debug!(%notice, "Notice");
        let _ = self.notices.send(notice);
    }
}
