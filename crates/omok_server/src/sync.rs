//! Reconciliation of the store's commit feed into the local move log.
//!
//! The feed is at-least-once and unordered. [`Reconciler`] turns it into a
//! strictly ordered log: repeats are dropped, early arrivals are buffered
//! until every lower order has been applied. [`SyncChannel`] owns the live
//! subscription around it and falls back to a full resynchronization when a
//! gap stays open too long or the transport drops.

use omok_core::{GameId, Move, MoveLog, MoveLogError};
use std::collections::BTreeMap;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Sleep, sleep};
use tracing::{debug, info, instrument, warn};

use crate::store::{FeedEvent, Game, GameStore, StoreError, Subscription};

/// Result of offering one commit event to the [`Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// These entries were appended, in order.
    Applied(Vec<Move>),
    /// The order was already applied or is already buffered.
    Duplicate,
    /// Held back until `waiting_for` arrives.
    Buffered {
        /// Lowest order still missing.
        waiting_for: u32,
    },
    /// The entry belongs to another game.
    Foreign,
    /// The entry contradicts the log (the store broke its contract).
    Rejected(MoveLogError),
}

/// Orders and deduplicates commit events for one game.
#[derive(Debug, Clone)]
pub struct Reconciler {
    log: MoveLog,
    pending: BTreeMap<u32, Move>,
}

impl Reconciler {
    /// Starts from an already consistent log.
    pub fn new(log: MoveLog) -> Self {
        Self {
            log,
            pending: BTreeMap::new(),
        }
    }

    /// The applied log.
    pub fn log(&self) -> &MoveLog {
        &self.log
    }

    /// True while an early arrival waits for a missing order.
    pub fn has_gap(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of buffered arrivals.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Replaces the log and forgets anything buffered.
    pub fn reset(&mut self, log: MoveLog) {
        self.log = log;
        self.pending.clear();
    }

    /// Offers one commit event.
    pub fn offer(&mut self, mv: Move) -> Reconciled {
        if mv.game_id() != self.log.game_id() {
            return Reconciled::Foreign;
        }
        let order = mv.move_order();
        if self.log.contains_order(order) || self.pending.contains_key(&order) {
            return Reconciled::Duplicate;
        }
        if order > self.log.next_order() {
            self.pending.insert(order, mv);
            return Reconciled::Buffered {
                waiting_for: self.log.next_order(),
            };
        }

        let mut applied = Vec::new();
        let mut next = Some(mv);
        while let Some(mv) = next {
            if let Err(e) = self.log.append(mv) {
                return Reconciled::Rejected(e);
            }
            applied.push(mv);
            next = self.pending.remove(&self.log.next_order());
        }
        Reconciled::Applied(applied)
    }
}

/// Why [`SyncChannel::next_signal`] woke up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncSignal {
    /// The feed delivered something. A closed feed reports
    /// [`FeedEvent::Dropped`].
    Event(FeedEvent),
    /// A gap stayed open past the bounded wait.
    GapExpired,
    /// A failed resync is due for another attempt.
    RetryDue,
}

/// Live subscription plus reconciliation state for one game.
#[derive(Debug)]
pub struct SyncChannel {
    game_id: GameId,
    store: Arc<dyn GameStore>,
    subscription: Option<Subscription>,
    reconciler: Reconciler,
    gap_timeout: Duration,
    resync_backoff: Duration,
    gap_deadline: Option<Pin<Box<Sleep>>>,
    retry_at: Option<Pin<Box<Sleep>>>,
}

impl SyncChannel {
    /// Subscribes, then fetches the authoritative game and log.
    ///
    /// Subscribing first means nothing committed during the fetch is lost;
    /// anything delivered twice is dropped by the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached or the fetched
    /// log is inconsistent.
    #[instrument(skip(store))]
    pub async fn connect(
        store: Arc<dyn GameStore>,
        game_id: GameId,
        gap_timeout: Duration,
        resync_backoff: Duration,
    ) -> Result<(Self, Game), StoreError> {
        let mut channel = Self {
            game_id,
            store,
            subscription: None,
            reconciler: Reconciler::new(MoveLog::new(game_id)),
            gap_timeout,
            resync_backoff,
            gap_deadline: None,
            retry_at: None,
        };
        let game = channel.establish().await?;
        info!(game_id, entries = channel.log().len(), "Sync channel connected");
        Ok((channel, game))
    }

    /// The reconciled log.
    pub fn log(&self) -> &MoveLog {
        self.reconciler.log()
    }

    /// Game this channel follows.
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// True while subscribed.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// True while an early arrival is buffered.
    pub fn has_gap(&self) -> bool {
        self.reconciler.has_gap()
    }

    /// Offers a commit event, arming or clearing the gap deadline.
    #[instrument(skip(self), fields(game_id = self.game_id, move_order = mv.move_order()))]
    pub fn offer(&mut self, mv: Move) -> Reconciled {
        let outcome = self.reconciler.offer(mv);
        match &outcome {
            Reconciled::Buffered { waiting_for } => {
                debug!(waiting_for, buffered = self.reconciler.buffered(), "Out-of-order entry buffered");
                if self.gap_deadline.is_none() {
                    self.gap_deadline = Some(Box::pin(sleep(self.gap_timeout)));
                }
            }
            Reconciled::Applied(applied) => {
                debug!(count = applied.len(), "Entries applied");
                if !self.reconciler.has_gap() {
                    self.gap_deadline = None;
                }
            }
            Reconciled::Duplicate => debug!("Duplicate entry ignored"),
            Reconciled::Foreign => warn!(other = mv.game_id(), "Entry for another game ignored"),
            Reconciled::Rejected(e) => warn!(error = %e, "Entry contradicts local log"),
        }
        outcome
    }

    /// Arms the gap deadline for an order the store is known to hold but
    /// the log has not applied yet. If it is still missing when the deadline
    /// fires, [`SyncSignal::GapExpired`] forces a resync.
    #[instrument(skip(self), fields(game_id = self.game_id))]
    pub fn expect_order(&mut self, move_order: u32) {
        if self.log().len() >= move_order as usize {
            return;
        }
        debug!(next = self.log().next_order(), "Waiting for a known commit");
        if self.gap_deadline.is_none() {
            self.gap_deadline = Some(Box::pin(sleep(self.gap_timeout)));
        }
    }

    /// Waits for the next feed event or timer.
    ///
    /// Cancel safe.
    pub async fn next_signal(&mut self) -> SyncSignal {
        let signal = tokio::select! {
            event = next_event(&mut self.subscription) => SyncSignal::Event(event),
            _ = fire(&mut self.gap_deadline) => SyncSignal::GapExpired,
            _ = fire(&mut self.retry_at) => SyncSignal::RetryDue,
        };
        match signal {
            SyncSignal::Event(FeedEvent::Dropped) => self.subscription = None,
            SyncSignal::GapExpired => self.gap_deadline = None,
            SyncSignal::RetryDue => self.retry_at = None,
            SyncSignal::Event(_) => {}
        }
        signal
    }

    /// Discards buffered state and rebuilds the log from the store.
    ///
    /// On failure the channel stays disconnected and schedules a retry,
    /// reported later as [`SyncSignal::RetryDue`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if resubscribing or refetching fails.
    #[instrument(skip(self), fields(game_id = self.game_id))]
    pub async fn resync(&mut self) -> Result<Game, StoreError> {
        self.close();
        match self.establish().await {
            Ok(game) => {
                info!(entries = self.log().len(), "Resynchronized");
                Ok(game)
            }
            Err(e) => {
                warn!(error = %e, backoff = ?self.resync_backoff, "Resync failed, will retry");
                self.subscription = None;
                self.retry_at = Some(Box::pin(sleep(self.resync_backoff)));
                Err(e)
            }
        }
    }

    /// Releases the subscription and every timer.
    #[instrument(skip(self), fields(game_id = self.game_id))]
    pub fn close(&mut self) {
        if self.subscription.take().is_some() {
            debug!("Subscription released");
        }
        self.gap_deadline = None;
        self.retry_at = None;
    }

    async fn establish(&mut self) -> Result<Game, StoreError> {
        let subscription = self.store.subscribe_moves(self.game_id).await?;
        let game = self.store.get_game(self.game_id).await?;
        let moves = self.store.list_moves(self.game_id).await?;
        let log = MoveLog::from_moves(self.game_id, moves)
            .map_err(|e| StoreError::Transport(format!("Inconsistent log from store: {}", e)))?;

        self.reconciler.reset(log);
        self.subscription = Some(subscription);
        self.gap_deadline = None;
        self.retry_at = None;
        Ok(game)
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> FeedEvent {
    match subscription {
        Some(subscription) => subscription.recv().await.unwrap_or(FeedEvent::Dropped),
        None => pending().await,
    }
}

async fn fire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}
