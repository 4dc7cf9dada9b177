//! Sequential driver firing a job at each schedule slot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use mockable::Clock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Schedule, describe_offset};

/// Async sleep used between slots.
#[async_trait]
pub trait ScheduleSleeper: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduleSleeper;

#[async_trait]
impl ScheduleSleeper for TokioScheduleSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A unit of recurring work.
///
/// Implementations own their error handling: a run reports through logs and
/// never aborts the driver.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Stable name used in log fields.
    fn name(&self) -> &'static str;

    /// Execute one run.
    async fn run(&self);
}

/// Runs a job at every slot of a [`Schedule`] until cancelled.
///
/// Runs are sequential: a slot that passes while a run is still executing
/// is skipped, and the next wait is computed from the time the run ended.
pub struct ScheduleDriver {
    job: Arc<dyn ScheduledJob>,
    schedule: Schedule,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn ScheduleSleeper>,
    run_immediately: bool,
}

impl ScheduleDriver {
    /// Driver using the Tokio sleeper.
    pub fn new(
        job: Arc<dyn ScheduledJob>,
        schedule: Schedule,
        offset: FixedOffset,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            job,
            schedule,
            offset,
            clock,
            sleeper: Arc::new(TokioScheduleSleeper),
            run_immediately: false,
        }
    }

    /// Also run once as soon as the driver starts.
    #[must_use]
    pub fn run_immediately(mut self) -> Self {
        self.run_immediately = true;
        self
    }

    /// Replace the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn ScheduleSleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Drive the job until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let job = self.job.name();
        info!(
            job,
            schedule = %self.schedule.describe(),
            timezone = %describe_offset(self.offset),
            "scheduler started"
        );

        if self.run_immediately && !cancel.is_cancelled() {
            self.job.run().await;
        }

        loop {
            let now = self.clock.utc();
            let next = self.schedule.next_after(now, self.offset);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(job, next_run = %next, wait_secs = wait.as_secs(), "waiting for next slot");

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.sleeper.sleep(wait) => {}
            }

            self.job.run().await;
        }

        info!(job, "scheduler stopped");
    }
}
