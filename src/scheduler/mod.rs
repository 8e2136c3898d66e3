//! Periodic scan scheduling
//!
//! A [`Scheduler`] is either `Stopped` or `Running`. While running, a single
//! task drives one [`MonitorEngine`] cycle per tick. Ticks are spaced from the
//! start of each cycle, so a slow cycle shortens the following wait instead
//! of pushing every later cycle back.
//!
//! The engine, and with it the previous snapshot and the alert cooldowns, is
//! built fresh on every `start()` and dropped on `stop()`.

use crate::scanner::{MonitorEngine, MonitorStatus};
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Pause after a faulted cycle before trying again
pub const FAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Builds the engine for one run of the scheduler
pub type EngineFactory = Arc<dyn Fn() -> crate::Result<MonitorEngine> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Running => write!(f, "running"),
        }
    }
}

struct RunningLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    factory: EngineFactory,
    interval: Duration,
    fault_backoff: Duration,
    status_tx: watch::Sender<MonitorStatus>,
    running: Option<RunningLoop>,
}

impl Scheduler {
    pub fn new<F>(interval: Duration, factory: F) -> Self
    where
        F: Fn() -> crate::Result<MonitorEngine> + Send + Sync + 'static,
    {
        let (status_tx, _) = watch::channel(MonitorStatus::default());
        Self {
            factory: Arc::new(factory),
            interval,
            fault_backoff: FAULT_BACKOFF,
            status_tx,
            running: None,
        }
    }

    pub fn with_fault_backoff(mut self, backoff: Duration) -> Self {
        self.fault_backoff = backoff;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Status published after every cycle. Survives restarts.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_tx.subscribe()
    }

    /// Latest published status
    pub fn status(&self) -> MonitorStatus {
        self.status_tx.borrow().clone()
    }

    /// Start the periodic loop.
    ///
    /// Returns `Ok(false)` when already running. Fails without changing state
    /// if the engine cannot be built (no targets, duplicate identities).
    pub fn start(&mut self) -> crate::Result<bool> {
        if self.running.is_some() {
            log::warn!("Scheduler already running; start ignored");
            return Ok(false);
        }

        let engine = (self.factory)()?.with_status_channel(self.status_tx.clone());
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            engine,
            self.interval,
            self.fault_backoff,
            token.clone(),
        ));

        log::info!(
            "Scheduler started (interval {:.1}s)",
            self.interval.as_secs_f64()
        );
        self.running = Some(RunningLoop { token, handle });
        Ok(true)
    }

    /// Ask the loop to exit and wait for it.
    ///
    /// A cycle already in progress runs to completion first. Returns `false`
    /// when the scheduler was not running.
    pub async fn stop(&mut self) -> bool {
        let Some(running) = self.running.take() else {
            log::debug!("Scheduler already stopped");
            return false;
        };

        running.token.cancel();
        if let Err(e) = running.handle.await {
            log::error!("Scheduler task ended abnormally: {}", e);
        }
        log::info!("Scheduler stopped");
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.token.cancel();
        }
    }
}

async fn run_loop(
    mut engine: MonitorEngine,
    interval: Duration,
    fault_backoff: Duration,
    token: CancellationToken,
) {
    while !token.is_cancelled() {
        let cycle_start = Instant::now();

        // Not raced against the token: in-flight probes finish on their own timeouts
        let outcome = AssertUnwindSafe(engine.run_cycle()).catch_unwind().await;

        let faulted = match outcome {
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                log::error!("Scan cycle failed: {}", e);
                true
            }
            Err(panic) => {
                log::error!("Scan cycle panicked: {}", panic_message(panic.as_ref()));
                engine.record_fault();
                true
            }
        };

        if faulted {
            log::warn!(
                "Retrying in {:.1}s",
                fault_backoff.as_secs_f64()
            );
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(fault_backoff) => {}
            }
        } else {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep_until(cycle_start + interval) => {}
            }
        }
    }
    log::debug!("Scan loop exited after {} cycle(s)", engine.stats().cycles);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
