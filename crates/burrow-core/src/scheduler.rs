//! The background scheduler driving update and report passes.
//!
//! [`Scheduler`] owns everything the loop needs. [`Scheduler::start`] runs
//! bootstrap on the caller's task, then moves the scheduler into a spawned
//! event loop and hands back a [`RunningScheduler`]. Stopping consumes that
//! handle and returns the [`Scheduler`] once the loop has exited, so a
//! second stop of the same run cannot be expressed. Dropping the handle
//! without stopping also ends the loop, because the stop channel closes;
//! the published state then moves to [`SchedulerState::Stopped`] as well.
//!
//! # Event loop
//!
//! ```text
//! loop
//!   +-- stop signal (checked first) ---> exit, timers dropped
//!   +-- update timer -----------------> run_update_pass
//!   +-- report timer -----------------> run_report_pass
//! ```
//!
//! The two timers are independent `tokio::time::Interval`s. When both are
//! ready the choice between them is random, so a slow cadence cannot starve
//! the other. Passes run to completion inside the loop; the stop signal is
//! only observed between passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::BurrowConfig;
use crate::lifecycle::{LifecycleEngine, LifecycleError};
use crate::pass::{self, PassSummary};
use crate::report::{ReportOutcome, ReportWriter};
use crate::seed::SeedLoader;
use crate::store::BurrowStore;

/// Errors raised while building or stopping the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The lifecycle configuration is unusable.
    #[error("lifecycle error: {source}")]
    Lifecycle {
        /// The underlying lifecycle error.
        #[from]
        source: LifecycleError,
    },

    /// A timer period of zero was configured.
    #[error("invalid scheduler configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// The event loop task panicked or was aborted.
    #[error("scheduler loop failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },
}

/// Lifecycle state of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not running.
    Stopped,
    /// Bootstrap in progress.
    Starting,
    /// Event loop running.
    Running,
    /// Stop requested, waiting for the loop to exit.
    Stopping,
}

/// What bootstrap did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The store was empty and this many seed burrows were created.
    Seeded(usize),
    /// Existing burrows were caught up.
    CaughtUp(PassSummary),
    /// Bootstrap failed; the loop starts with whatever the store holds.
    Failed(String),
}

/// Counters accumulated by one run of the event loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Update passes that completed their scan.
    pub update_passes: u64,
    /// Report passes that completed, whether or not a file was written.
    pub report_passes: u64,
    /// Reports written to disk.
    pub reports_written: u64,
    /// Passes abandoned because of a scan or report error.
    pub failed_passes: u64,
}

/// Periodic lifecycle and report scheduler.
pub struct Scheduler {
    store: Arc<dyn BurrowStore>,
    seed: Arc<dyn SeedLoader>,
    clock: Arc<dyn Clock>,
    engine: LifecycleEngine,
    writer: ReportWriter,
    update_interval: Duration,
    report_interval: Duration,
    reset_on_start: bool,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("update_interval", &self.update_interval)
            .field("report_interval", &self.report_interval)
            .field("reports", &self.writer.directory())
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Build a stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if either interval is zero or the
    /// lifecycle parameters are invalid.
    pub fn new(
        config: &BurrowConfig,
        store: Arc<dyn BurrowStore>,
        seed: Arc<dyn SeedLoader>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SchedulerError> {
        let update_interval = config.scheduler.update_interval();
        let report_interval = config.scheduler.report_interval();
        if update_interval.is_zero() || report_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig {
                reason: "update and report intervals must be non-zero".to_owned(),
            });
        }

        let (state, _) = watch::channel(SchedulerState::Stopped);
        Ok(Self {
            store,
            seed,
            clock,
            engine: LifecycleEngine::new(&config.scheduler)?,
            writer: ReportWriter::new(config.reports.directory.clone()),
            update_interval,
            report_interval,
            reset_on_start: config.bootstrap.reset_on_start,
            state: Arc::new(state),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Run bootstrap, then launch the event loop on a background task.
    ///
    /// Bootstrap failures are logged and never prevent the loop from
    /// starting. The first update and report ticks fire one full interval
    /// after this returns.
    pub async fn start(self) -> RunningScheduler {
        self.state.send_replace(SchedulerState::Starting);
        info!(
            update_interval = ?self.update_interval,
            report_interval = ?self.report_interval,
            "Scheduler starting"
        );

        let bootstrap = self.bootstrap().await;

        let state = Arc::clone(&self.state);
        let (stop_tx, stop_rx) = oneshot::channel();
        state.send_replace(SchedulerState::Running);
        let task = tokio::spawn(self.run_loop(stop_rx));
        info!("Scheduler started");

        RunningScheduler {
            stop_tx,
            task,
            state,
            bootstrap,
        }
    }

    /// Load the seed set into an empty store, or catch up existing records.
    pub async fn bootstrap(&self) -> BootstrapOutcome {
        if self.reset_on_start {
            match self.store.delete_all().await {
                Ok(()) => warn!("Deleted all burrows before bootstrap (reset_on_start)"),
                Err(e) => error!(error = %e, "Failed to reset store before bootstrap"),
            }
        }

        let existing = match self.store.list_all().await {
            Ok(burrows) => burrows,
            Err(e) => {
                error!(error = %e, "Bootstrap scan failed, starting without catch-up");
                return BootstrapOutcome::Failed(e.to_string());
            }
        };

        if existing.is_empty() {
            return self.seed_store().await;
        }

        let now = self.clock.now();
        info!(existing = existing.len(), "Catching up existing burrows");
        let summary =
            pass::apply_update_pass(self.store.as_ref(), &self.engine, now, &existing).await;
        BootstrapOutcome::CaughtUp(summary)
    }

    async fn seed_store(&self) -> BootstrapOutcome {
        let definitions = match self.seed.load_initial_set().await {
            Ok(definitions) => definitions,
            Err(e) => {
                error!(error = %e, "Failed to load seed burrows");
                return BootstrapOutcome::Failed(e.to_string());
            }
        };

        match self.store.create_bulk(&definitions).await {
            Ok(created) => {
                info!(count = created.len(), "Loaded initial burrows");
                BootstrapOutcome::Seeded(created.len())
            }
            Err(e) => {
                error!(error = %e, "Failed to create seed burrows");
                BootstrapOutcome::Failed(e.to_string())
            }
        }
    }

    async fn run_loop(self, mut stop_rx: oneshot::Receiver<()>) -> (Self, RunStats) {
        let mut update_timer = interval_after(self.update_interval);
        let mut report_timer = interval_after(self.report_interval);
        let mut stats = RunStats::default();

        loop {
            let tick = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                tick = next_tick(&mut update_timer, &mut report_timer) => tick,
            };

            match tick {
                Tick::Update => self.update_tick(&mut stats).await,
                Tick::Report => self.report_tick(&mut stats).await,
            }
        }

        info!(
            update_passes = stats.update_passes,
            report_passes = stats.report_passes,
            failed_passes = stats.failed_passes,
            "Scheduler loop exited"
        );
        self.state.send_replace(SchedulerState::Stopped);
        (self, stats)
    }

    async fn update_tick(&self, stats: &mut RunStats) {
        let now = self.clock.now();
        match pass::run_update_pass(self.store.as_ref(), &self.engine, now).await {
            Ok(_) => stats.update_passes = stats.update_passes.saturating_add(1),
            Err(e) => {
                warn!(error = %e, "Update pass abandoned");
                stats.failed_passes = stats.failed_passes.saturating_add(1);
            }
        }
    }

    async fn report_tick(&self, stats: &mut RunStats) {
        let now = self.clock.now();
        match pass::run_report_pass(self.store.as_ref(), &self.writer, now).await {
            Ok(outcome) => {
                stats.report_passes = stats.report_passes.saturating_add(1);
                if matches!(outcome, ReportOutcome::Written(_)) {
                    stats.reports_written = stats.reports_written.saturating_add(1);
                }
            }
            Err(e) => {
                warn!(error = %e, "Report pass abandoned");
                stats.failed_passes = stats.failed_passes.saturating_add(1);
            }
        }
    }
}

/// Handle to a running scheduler.
#[derive(Debug)]
pub struct RunningScheduler {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<(Scheduler, RunStats)>,
    state: Arc<watch::Sender<SchedulerState>>,
    bootstrap: BootstrapOutcome,
}

impl RunningScheduler {
    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// What bootstrap did before the loop started.
    pub const fn bootstrap(&self) -> &BootstrapOutcome {
        &self.bootstrap
    }

    /// Signal the loop to exit and wait for it.
    ///
    /// A pass already in progress finishes first. Both timers are dropped
    /// with the loop. Returns the stopped scheduler, which can be started
    /// again, and the counters of this run.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Join`] if the loop task panicked.
    pub async fn stop(self) -> Result<(Scheduler, RunStats), SchedulerError> {
        self.state.send_replace(SchedulerState::Stopping);
        info!("Scheduler stopping");

        // The loop may already have ended; the join below reports why.
        let _ = self.stop_tx.send(());

        let result = self.task.await.map_err(|e| SchedulerError::Join {
            message: e.to_string(),
        });
        self.state.send_replace(SchedulerState::Stopped);
        info!("Scheduler stopped");
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Update,
    Report,
}

/// An interval whose first tick is one period from now.
fn interval_after(period: Duration) -> Interval {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer.reset();
    timer
}

async fn next_tick(update: &mut Interval, report: &mut Interval) -> Tick {
    tokio::select! {
        _ = update.tick() => Tick::Update,
        _ = report.tick() => Tick::Report,
    }
}
