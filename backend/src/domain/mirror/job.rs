//! Scheduled mirror pass.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::ErrorCode;
use crate::domain::schedule::ScheduledJob;

use super::MirrorSyncService;

/// Runs [`MirrorSyncService::try_sync_all`] on the mirror schedule.
pub struct MirrorJob {
    service: Arc<MirrorSyncService>,
}

impl MirrorJob {
    pub fn new(service: Arc<MirrorSyncService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ScheduledJob for MirrorJob {
    fn name(&self) -> &'static str {
        "mirror"
    }

    async fn run(&self) {
        match self.service.try_sync_all().await {
            Ok(report) if report.failures() > 0 => warn!(
                failures = report.failures(),
                duration_ms = report.duration_ms,
                "scheduled mirror sync finished with failures"
            ),
            Ok(_) => {}
            Err(err) if err.code() == ErrorCode::Conflict => {
                info!("scheduled mirror sync skipped: a pass is already running");
            }
            Err(err) => warn!(error = %err, "scheduled mirror sync failed"),
        }
    }
}
