//! Remote-to-local mirror of the tables the till needs offline.
//!
//! A pass pulls reference tables concurrently, then the core product tables
//! one by one, then rebuilds the stock mirror. Every table is isolated: a
//! failure is recorded in the [`SyncReport`] and the pass moves on.

mod job;
mod records;
mod report;
mod table;

pub use job::MirrorJob;
pub use records::{
    Keyed, LookupRecord, MirrorBatch, MirrorRows, PartyRecord, ProductRecord,
    ProductVariationRecord, StockRecord, SupplierRecord, UserRecord,
};
pub use report::{ColumnDrift, SyncReport, TableSyncOutcome, TableSyncReport};
pub use table::{MirrorTable, TableSyncPolicy};

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::join_all;
use mockable::Clock;
use tracing::{debug, info, warn};

use crate::domain::Error;
use crate::domain::ports::{MirrorSource, MirrorStore};
use crate::domain::schedule::RunGuard;

/// Keeps the local mirror in step with the primary database.
pub struct MirrorSyncService {
    source: Arc<dyn MirrorSource>,
    store: Arc<dyn MirrorStore>,
    clock: Arc<dyn Clock>,
    guard: RunGuard,
    last_report: Mutex<Option<SyncReport>>,
}

impl MirrorSyncService {
    pub fn new(
        source: Arc<dyn MirrorSource>,
        store: Arc<dyn MirrorStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            guard: RunGuard::default(),
            last_report: Mutex::new(None),
        }
    }

    async fn apply(&self, table: MirrorTable) -> Result<TableSyncOutcome, String> {
        let mut batch = self
            .source
            .fetch(table)
            .await
            .map_err(|err| err.to_string())?;

        match table.policy() {
            TableSyncPolicy::UpsertKeepOnEmpty => {
                if batch.is_empty() {
                    return Ok(TableSyncOutcome::SkippedEmpty);
                }
                let rows = self.store.upsert(batch).await.map_err(|err| err.to_string())?;
                Ok(TableSyncOutcome::Mirrored { rows })
            }
            TableSyncPolicy::ReplaceClearOnEmpty => {
                let dropped = batch.retain_sellable();
                if dropped > 0 {
                    debug!(table = %table, dropped, "dropped rows without sellable quantity");
                }
                if batch.is_empty() {
                    self.store.clear(table).await.map_err(|err| err.to_string())?;
                    return Ok(TableSyncOutcome::Cleared);
                }
                let rows = self
                    .store
                    .replace_all(batch)
                    .await
                    .map_err(|err| err.to_string())?;
                Ok(TableSyncOutcome::Mirrored { rows })
            }
        }
    }

    /// Synchronise one table, capturing any failure in the outcome.
    pub async fn sync_table(&self, table: MirrorTable) -> TableSyncReport {
        let outcome = match self.apply(table).await {
            Ok(outcome) => {
                debug!(table = %table, ?outcome, "mirror table synced");
                outcome
            }
            Err(message) => {
                warn!(table = %table, error = %message, "mirror table sync failed");
                TableSyncOutcome::Failed { message }
            }
        };
        TableSyncReport { table, outcome }
    }

    /// Run a full pass and remember its report.
    pub async fn sync_all(&self) -> SyncReport {
        let started_at = self.clock.utc();
        let mut tables = join_all(
            MirrorTable::REFERENCE
                .iter()
                .map(|table| self.sync_table(*table)),
        )
        .await;
        for table in MirrorTable::CORE {
            tables.push(self.sync_table(table).await);
        }
        tables.push(self.sync_table(MirrorTable::Stock).await);

        let finished_at = self.clock.utc();
        let report = SyncReport {
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
            tables,
        };
        info!(
            duration_ms = report.duration_ms,
            failures = report.failures(),
            "mirror sync finished"
        );
        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    /// Run a full pass unless one is already in flight.
    pub async fn try_sync_all(&self) -> Result<SyncReport, Error> {
        let Some(_permit) = self.guard.try_acquire() else {
            return Err(Error::conflict("a mirror sync is already running"));
        };
        Ok(self.sync_all().await)
    }

    /// Report of the most recent completed pass.
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a pass is in flight.
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Compare declared columns with both databases and log any drift.
    ///
    /// Returns every drift found. Inspection failures are logged and
    /// treated as no drift for that side.
    pub async fn verify_schema(&self) -> Vec<ColumnDrift> {
        let mut drift = Vec::new();
        match self.source.missing_columns().await {
            Ok(found) => {
                for entry in &found {
                    warn!(table = %entry.table, missing = ?entry.missing, "primary lacks mirrored columns");
                }
                drift.extend(found);
            }
            Err(err) => warn!(error = %err, "primary schema check failed"),
        }
        match self.store.missing_columns().await {
            Ok(found) => {
                for entry in &found {
                    warn!(table = %entry.table, missing = ?entry.missing, "mirror lacks declared columns");
                }
                drift.extend(found);
            }
            Err(err) => warn!(error = %err, "mirror schema check failed"),
        }
        drift
    }
}
