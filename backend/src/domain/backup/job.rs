//! Scheduled backup pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::domain::ErrorCode;
use crate::domain::schedule::ScheduledJob;

use super::BackupService;

/// Runs [`BackupService::run_backup_pass`] on the backup schedule.
pub struct BackupJob {
    service: Arc<BackupService>,
}

impl BackupJob {
    pub fn new(service: Arc<BackupService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for BackupJob {
    fn name(&self) -> &'static str {
        "backup"
    }

    async fn run(&self) {
        match self.service.run_backup_pass().await {
            Ok(outcome) => info!(
                filename = %outcome.created.filename,
                size = %outcome.created.size,
                pruned = outcome.pruned,
                "scheduled backup completed"
            ),
            Err(err) if err.code() == ErrorCode::Conflict => {
                info!("scheduled backup skipped: a pass is already running");
            }
            Err(err) => error!(error = %err, "scheduled backup failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use rstest::rstest;

    use crate::domain::backup::BackupPolicy;
    use crate::domain::ports::{DumpStore, FixtureDumpSource, FixtureDumpStore};
    use crate::domain::schedule::Schedule;
    use crate::test_support::MutableClock;

    #[rstest]
    #[tokio::test]
    async fn run_creates_a_dump_and_applies_retention() {
        let now = Utc
            .with_ymd_and_hms(2024, 6, 1, 2, 0, 0)
            .single()
            .expect("valid time");
        let store = Arc::new(FixtureDumpStore::default());
        store.set_modified(now);
        let service = Arc::new(BackupService::new(
            Arc::new(FixtureDumpSource),
            store.clone(),
            Arc::new(MutableClock::new(now)),
            BackupPolicy {
                keep_count: 1,
                schedule: Schedule::daily_at(2, 0).expect("valid schedule"),
                schedule_enabled: true,
                offset: FixedOffset::east_opt(0).expect("utc offset"),
            },
        ));
        let job = BackupJob::new(service);

        job.run().await;
        job.run().await;

        let stored = store.list().await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(job.name(), "backup");
    }
}
