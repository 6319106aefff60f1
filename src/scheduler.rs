//! Fixed-cadence driver for a [`Sweeper`].
//!
//! The loop runs as a tokio task; every sweep is handed to the blocking pool
//! together with the sweeper and handed back afterwards, so bus I/O never
//! runs on the async workers and is never performed by two threads at once.
//!
//! The cadence is self-correcting: the sleep after each sweep is the interval
//! minus the sweep's own duration, floored at zero. Sweeps that take at least
//! a full interval are counted as overruns in [`SchedulerStats`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::history::HistoryStore;
use crate::sweep::Sweeper;

/// How long [`PollingScheduler::stop`] waits for the loop to exit.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,

    /// The loop did not exit within the join timeout. It keeps running until
    /// its current sweep finishes, and the sweeper is lost.
    TimedOut,

    NotRunning,
}

/// Counters shared between the polling loop and observers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    sweeps: AtomicU64,
    overruns: AtomicU64,
    consecutive_overruns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub sweeps: u64,
    pub overruns: u64,
    pub consecutive_overruns: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> PollStats {
        PollStats {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            consecutive_overruns: self.consecutive_overruns.load(Ordering::Relaxed),
        }
    }

    /// Returns the current overrun streak, zero if this sweep fit the interval.
    fn record(&self, elapsed: Duration, interval: Duration) -> u64 {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
        if elapsed < interval {
            self.consecutive_overruns.store(0, Ordering::Relaxed);
            return 0;
        }

        self.overruns.fetch_add(1, Ordering::Relaxed);
        self.consecutive_overruns.fetch_add(1, Ordering::Relaxed) + 1
    }
}

enum State<S> {
    /// `None` once the sweeper has been lost to a panic or a timed-out stop.
    Idle(Option<S>),
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<Option<S>>,
    },
}

pub struct PollingScheduler<S> {
    history: HistoryStore,
    interval: Duration,
    join_timeout: Duration,
    stats: Arc<SchedulerStats>,
    state: State<S>,
}

impl<S: Sweeper + Send + 'static> PollingScheduler<S> {
    pub fn new(sweeper: S, history: HistoryStore, interval: Duration) -> Self {
        Self {
            history,
            interval,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            stats: Arc::new(SchedulerStats::default()),
            state: State::Idle(Some(sweeper)),
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Launches the polling loop. Returns `false` if it was already running or
    /// the sweeper is no longer available. Must be called within a tokio
    /// runtime.
    pub fn start(&mut self) -> bool {
        let sweeper = match &mut self.state {
            State::Running { .. } => return false,
            State::Idle(sweeper) => match sweeper.take() {
                Some(sweeper) => sweeper,
                None => {
                    warn!("cannot start polling: sweeper was lost");
                    return false;
                }
            },
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            sweeper,
            self.history.clone(),
            self.interval,
            Arc::clone(&self.stats),
            cancel.clone(),
        ));
        self.state = State::Running { cancel, handle };

        true
    }

    /// Signals the loop and waits up to the join timeout for it to exit. An
    /// in-flight sweep always runs to completion.
    pub async fn stop(&mut self) -> StopOutcome {
        let (cancel, handle) = match std::mem::replace(&mut self.state, State::Idle(None)) {
            State::Running { cancel, handle } => (cancel, handle),
            idle @ State::Idle(_) => {
                self.state = idle;
                return StopOutcome::NotRunning;
            }
        };

        cancel.cancel();
        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(sweeper)) => {
                self.state = State::Idle(sweeper);
                StopOutcome::Stopped
            }
            Ok(Err(e)) => {
                error!(error = %e, "polling task failed");
                StopOutcome::Stopped
            }
            Err(_) => {
                error!(
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "polling loop did not stop in time; leaving it to finish in the background"
                );
                StopOutcome::TimedOut
            }
        }
    }

    /// Gives back the sweeper of an idle scheduler.
    pub fn into_sweeper(self) -> Option<S> {
        match self.state {
            State::Idle(sweeper) => sweeper,
            State::Running { cancel, .. } => {
                cancel.cancel();
                None
            }
        }
    }
}

async fn poll_loop<S: Sweeper + Send + 'static>(
    mut sweeper: S,
    history: HistoryStore,
    interval: Duration,
    stats: Arc<SchedulerStats>,
    cancel: CancellationToken,
) -> Option<S> {
    info!(interval_ms = interval.as_millis() as u64, "polling started");

    while !cancel.is_cancelled() {
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || {
            let snapshot = sweeper.sweep();
            (sweeper, snapshot)
        })
        .await;
        let snapshot = match joined {
            Ok((returned, snapshot)) => {
                sweeper = returned;
                snapshot
            }
            Err(e) => {
                error!(error = %e, "sweep panicked; polling stopped");
                return None;
            }
        };
        history.push(snapshot);

        let elapsed = started.elapsed();
        let streak = stats.record(elapsed, interval);
        if streak > 0 {
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                consecutive = streak,
                "sweep overran the poll interval"
            );
        }

        let remaining = interval.saturating_sub(elapsed);
        if remaining.is_zero() {
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(remaining) => {}
        }
    }

    info!("polling stopped");
    Some(sweeper)
}
