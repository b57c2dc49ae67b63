//! Periodic eviction of expired entries.
//!
//! The reaper is a cleanup optimization only. Both stores check expiry on
//! every access, so correctness never depends on a sweep having run.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Smallest interval accepted; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A store the reaper can sweep.
pub trait Sweep: Send + Sync {
    /// Short label used in logs and reports.
    fn name(&self) -> &'static str;

    /// Remove every expired entry and return how many were removed.
    fn sweep_expired(&self) -> Result<usize>;
}

/// Outcome of one pass over all sweep targets.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Entries removed, per target.
    pub removed: Vec<(&'static str, usize)>,

    /// Targets whose sweep failed or panicked, with the reason.
    pub failures: Vec<(&'static str, String)>,
}

impl SweepReport {
    /// Total entries removed across all targets.
    pub fn total_removed(&self) -> usize {
        self.removed.iter().map(|(_, n)| n).sum()
    }

    /// Whether every target swept without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Removed count for a single target.
    pub fn removed_from(&self, name: &str) -> Option<usize> {
        self.removed
            .iter()
            .find(|(target, _)| *target == name)
            .map(|(_, n)| *n)
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "removed {}", self.total_removed())?;
        for (name, count) in &self.removed {
            write!(f, " {name}={count}")?;
        }
        if !self.failures.is_empty() {
            write!(f, ", {} failed", self.failures.len())?;
        }
        Ok(())
    }
}

/// Background task that sweeps its targets on a fixed interval.
///
/// The task is spawned at most once per reaper, no matter how many times
/// [`ensure_started`](Reaper::ensure_started) is called. Dropping the last
/// handle to the reaper aborts the task.
pub struct Reaper {
    interval: Duration,
    targets: Vec<Arc<dyn Sweep>>,
    started: AtomicBool,

    /// Set once the missing-runtime warning has been logged.
    runtime_warned: AtomicBool,

    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reaper {
    /// Create a reaper with no targets.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            targets: Vec::new(),
            started: AtomicBool::new(false),
            runtime_warned: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Add a sweep target.
    pub fn with_target(mut self, target: Arc<dyn Sweep>) -> Self {
        self.targets.push(target);
        self
    }

    /// Interval between sweeps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the background task has been started.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Sweep every target once on the calling thread.
    pub fn run_once(&self) -> SweepReport {
        sweep_all(&self.targets)
    }

    /// Spawn the background task if it is not already running.
    ///
    /// Returns `true` only for the call that actually started it. Without a
    /// Tokio runtime on the current thread nothing is spawned and a later
    /// call may try again; only the first such miss is logged as a warning.
    pub fn ensure_started(&self) -> bool {
        if self.started.load(Ordering::Acquire) {
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            if !self.runtime_warned.swap(true, Ordering::AcqRel) {
                warn!("No Tokio runtime on this thread, deferring reaper start");
            } else {
                debug!("No Tokio runtime on this thread, deferring reaper start");
            }
            return false;
        };

        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let task = runtime.spawn(sweep_loop(self.interval, self.targets.clone()));
        *self.task.lock() = Some(task);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            targets = self.targets.len(),
            "Reaper started"
        );
        true
    }

    /// Abort the background task. The reaper is not restarted afterwards.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("Reaper stopped");
        }
    }
}

impl fmt::Debug for Reaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaper")
            .field("interval", &self.interval)
            .field(
                "targets",
                &self.targets.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("started", &self.is_started())
            .finish()
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn sweep_loop(interval: Duration, targets: Vec<Arc<dyn Sweep>>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately; skip it so the first sweep
    // happens one full interval after start.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let report = sweep_all(&targets);
        debug!(report = %report, "Reaper pass complete");
    }
}

/// Sweep each target inside its own failure boundary.
fn sweep_all(targets: &[Arc<dyn Sweep>]) -> SweepReport {
    let mut report = SweepReport::default();

    for target in targets {
        let name = target.name();
        match panic::catch_unwind(AssertUnwindSafe(|| target.sweep_expired())) {
            Ok(Ok(count)) => {
                if count > 0 {
                    debug!(store = name, count, "Swept expired entries");
                }
                report.removed.push((name, count));
            }
            Ok(Err(e)) => {
                warn!(store = name, error = %e, "Sweep failed, will retry next interval");
                report.failures.push((name, e.to_string()));
            }
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                warn!(store = name, reason = %reason, "Sweep panicked, will retry next interval");
                report.failures.push((name, reason));
            }
        }
    }

    report
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
