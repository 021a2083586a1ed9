//! Per-turn countdown clock.
//!
//! The clock owns at most one timer. Every [`TurnClock::start`] and
//! [`TurnClock::stop`] drops the previous timer before anything else, so a
//! stale tick can never decrement the new turn's allowance.

use omok_core::Stone;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{Instant, Interval, interval_at};
use tracing::{debug, info, instrument};

/// Observable clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    /// Counting down for the color on turn.
    Running {
        /// Color whose time is running.
        active: Stone,
        /// Ticks left.
        remaining: u32,
    },
    /// The active color ran out of time; the forfeiture is pending.
    Expired(Stone),
    /// No timer (game over, not started, reconnecting, or torn down).
    Stopped,
}

impl ClockState {
    /// State after one tick. Only `Running` changes.
    pub fn tick(self) -> Self {
        match self {
            ClockState::Running { active, remaining } if remaining <= 1 => {
                ClockState::Expired(active)
            }
            ClockState::Running { active, remaining } => ClockState::Running {
                active,
                remaining: remaining - 1,
            },
            other => other,
        }
    }

    /// Color the clock is bound to, if any.
    pub fn active(self) -> Option<Stone> {
        match self {
            ClockState::Running { active, .. } | ClockState::Expired(active) => Some(active),
            ClockState::Stopped => None,
        }
    }
}

/// Countdown for the color on turn, driven by a single cancellable timer.
#[derive(Debug)]
pub struct TurnClock {
    state: ClockState,
    allowance: u32,
    period: Duration,
    timer: Option<Interval>,
}

impl TurnClock {
    /// Creates a stopped clock granting `allowance` ticks of `period` per turn.
    #[instrument]
    pub fn new(allowance: u32, period: Duration) -> Self {
        Self {
            state: ClockState::Stopped,
            allowance,
            period,
            timer: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Ticks granted per turn.
    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    /// True while a timer is scheduled.
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// Cancels any running timer and starts a full allowance for `active`.
    #[instrument(skip(self))]
    pub fn start(&mut self, active: Stone) {
        self.timer = None;
        self.state = ClockState::Running {
            active,
            remaining: self.allowance,
        };
        self.timer = Some(interval_at(Instant::now() + self.period, self.period));
        debug!(remaining = self.allowance, "Turn clock started");
    }

    /// Cancels any running timer.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        if self.timer.take().is_some() || self.state != ClockState::Stopped {
            info!(previous = ?self.state, "Turn clock stopped");
        }
        self.state = ClockState::Stopped;
    }

    /// Waits for the next tick and applies it.
    ///
    /// Pends forever while no timer is armed. On expiry the timer is
    /// released; the clock stays `Expired` until restarted or stopped.
    /// Cancel safe: nothing changes until the tick has fired.
    pub async fn next_tick(&mut self) -> ClockState {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }

        self.state = self.state.tick();
        if let ClockState::Expired(active) = self.state {
            self.timer = None;
            info!(stone = %active, "Turn clock expired");
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_down_to_expiry() {
        let mut state = ClockState::Running {
            active: Stone::Black,
            remaining: 2,
        };
        state = state.tick();
        assert_eq!(
            state,
            ClockState::Running {
                active: Stone::Black,
                remaining: 1
            }
        );
        assert_eq!(state.tick(), ClockState::Expired(Stone::Black));
        assert_eq!(ClockState::Stopped.tick(), ClockState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_allowance() {
        let mut clock = TurnClock::new(3, Duration::from_secs(1));
        clock.start(Stone::Black);
        let started = Instant::now();

        let mut last = clock.state();
        while !matches!(last, ClockState::Expired(_)) {
            last = clock.next_tick().await;
        }
        assert_eq!(last, ClockState::Expired(Stone::Black));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(!clock.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_timer() {
        let mut clock = TurnClock::new(60, Duration::from_secs(1));
        clock.start(Stone::Black);
        clock.next_tick().await;
        clock.next_tick().await;
        clock.start(Stone::White);
        assert_eq!(
            clock.state(),
            ClockState::Running {
                active: Stone::White,
                remaining: 60
            }
        );
        assert_eq!(
            clock.next_tick().await,
            ClockState::Running {
                active: Stone::White,
                remaining: 59
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_clock_never_ticks() {
        let mut clock = TurnClock::new(5, Duration::from_secs(1));
        clock.start(Stone::White);
        clock.stop();
        let waited = tokio::time::timeout(Duration::from_secs(30), clock.next_tick()).await;
        assert!(waited.is_err());
        assert_eq!(clock.state(), ClockState::Stopped);
    }
}
