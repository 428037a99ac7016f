//! Periodic empty-room sweep for planpoker.
//!
//! Rooms are normally deleted when their last player leaves. The sweep
//! catches the rest: rooms emptied by a path that didn't delete them,
//! or rooms whose creator never came back. It runs as its own Tokio
//! task on a fixed interval and only touches room locks transiently.
//!
//! # Disabled mode
//!
//! A zero interval disables sweeping: [`SweepScheduler::wait_for_sweep`]
//! pends forever, and the sweeper task idles until shut down.
//!
//! ```ignore
//! let sweeper = spawn_sweeper(Arc::clone(&registry), SweepConfig::default());
//! // ... serve ...
//! let removed = sweeper.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use planpoker_room::RoomRegistry;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sweep timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Time between sweeps. Zero disables sweeping.
    pub interval: Duration,
    /// Upper bound of a random delay added to the first sweep, so
    /// processes started together don't sweep in lockstep.
    pub initial_jitter: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            initial_jitter: Duration::from_secs(5),
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted; anything below (except zero) is raised.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// A config with the given interval and no jitter.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            initial_jitter: Duration::ZERO,
        }
    }

    /// Raises a non-zero interval below [`Self::MIN_INTERVAL`].
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "sweep interval below minimum, raising"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }

    /// Returns `true` if sweeping is turned off.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_zero()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Information about one fired sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepTick {
    /// Sweep number, starting at 1.
    pub sweep: u64,
    /// How far past its deadline the sweep fired.
    pub late_by: Duration,
}

/// Fixed-interval timer driving the sweep loop.
///
/// A late sweep never triggers catch-up sweeps: the next deadline is
/// always one interval after the sweep actually fired.
#[derive(Debug)]
pub struct SweepScheduler {
    interval: Option<Duration>,
    next: Option<TokioInstant>,
    count: u64,
}

impl SweepScheduler {
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();
        let interval = (!config.is_disabled()).then_some(config.interval);

        let next = interval.map(|d| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let max_ms = config.initial_jitter.as_millis() as u64;
                Duration::from_millis(rand::rng().random_range(0..=max_ms))
            };
            TokioInstant::now() + d + jitter
        });

        match interval {
            Some(d) => debug!(interval_secs = d.as_secs(), "sweep scheduler created"),
            None => debug!("sweep scheduler created in disabled mode"),
        }

        Self {
            interval,
            next,
            count: 0,
        }
    }

    /// Waits for the next sweep deadline.
    ///
    /// Pends forever when disabled; use inside `tokio::select!`.
    pub async fn wait_for_sweep(&mut self) -> SweepTick {
        let (next, interval) = match (self.next, self.interval) {
            (Some(next), Some(interval)) => (next, interval),
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.count += 1;
        self.next = Some(now + interval);

        SweepTick {
            sweep: self.count,
            late_by: now.saturating_duration_since(next),
        }
    }

    /// Sweeps fired so far.
    pub fn sweep_count(&self) -> u64 {
        self.count
    }

    /// The sweep interval, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Sweeps `registry` on every scheduler tick until `shutdown` flips to
/// `true` or its sender is dropped. Returns the total rooms removed.
pub async fn run_sweeper(
    registry: Arc<RoomRegistry>,
    config: SweepConfig,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut scheduler = SweepScheduler::new(config);
    let mut total = 0;

    info!(disabled = scheduler.is_disabled(), "room sweeper started");

    loop {
        tokio::select! {
            tick = scheduler.wait_for_sweep() => {
                let removed = registry.sweep_empty().await;
                total += removed;
                info!(sweep = tick.sweep, removed, "swept empty rooms");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!(total, "room sweeper stopped");
    total
}

/// Handle to a sweeper task started with [`spawn_sweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<usize>,
}

impl SweeperHandle {
    /// Stops the sweeper and returns the total rooms it removed.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(true);
        self.task.await.unwrap_or_else(|e| {
            warn!(error = %e, "sweeper task failed");
            0
        })
    }
}

/// Spawns [`run_sweeper`] on the current runtime.
pub fn spawn_sweeper(registry: Arc<RoomRegistry>, config: SweepConfig) -> SweeperHandle {
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(run_sweeper(registry, config, rx));
    SweeperHandle { shutdown, task }
}
