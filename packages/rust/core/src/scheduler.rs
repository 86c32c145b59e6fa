//! Periodic collection and the run-mutex shared with manual triggers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

use newsdesk_shared::{Result, SchedulerConfig, SourceDescriptor};

use crate::collect::{Collector, CycleReport, ProgressReporter, SilentProgress};

/// Single entry point for every collection cycle, scheduled or manual.
///
/// At most one cycle runs at a time; an overlapping request is skipped,
/// not queued.
pub struct CycleRunner {
    collector: Collector,
    sources: Vec<SourceDescriptor>,
    running: Mutex<()>,
}

impl CycleRunner {
    pub fn new(collector: Collector, sources: Vec<SourceDescriptor>) -> Self {
        Self {
            collector,
            sources,
            running: Mutex::new(()),
        }
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Run a cycle unless one is already in flight (`Ok(None)`).
    pub async fn try_run(&self, progress: &dyn ProgressReporter) -> Result<Option<CycleReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("collection cycle already running, request skipped");
            return Ok(None);
        };
        self.collector.run_cycle(&self.sources, progress).await.map(Some)
    }
}

/// Fixed-interval trigger for [`CycleRunner`].
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    initial_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<CycleRunner>, config: &SchedulerConfig) -> Self {
        Self {
            runner,
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            interval: Duration::from_secs(config.interval_secs.max(1)),
        }
    }

    /// Wait the initial delay, then run a cycle every interval until
    /// `shutdown` resolves. A cycle in progress is allowed to finish.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(
            initial_delay_secs = self.initial_delay.as_secs(),
            interval_secs = self.interval.as_secs(),
            "scheduler started"
        );

        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopped before first cycle");
                return;
            }
            _ = sleep(self.initial_delay) => {}
        }

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("scheduler stopped");
                    return;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        match self.runner.try_run(&SilentProgress).await {
            Ok(Some(report)) => {
                if report.inserted.is_empty() {
                    info!("scheduled cycle: nothing new");
                } else {
                    info!(inserted = report.inserted.len(), "scheduled cycle: new records");
                }
            }
            Ok(None) => {}
            // The next tick starts from scratch.
            Err(e) => error!(error = %e, "scheduled cycle failed"),
        }
    }
}
