//! Point-in-time SQL dumps of the primary database.
//!
//! [`BackupService`] renders the whole database into a replayable script,
//! persists it through a [`DumpStore`], and answers the dashboard's questions
//! about the dumps on disk. Listing and statistics degrade to empty answers
//! on storage failures; creation, pruning and deletion surface them.

mod filename;
mod job;
mod script;
mod stats;

pub use filename::{DUMP_EXTENSION, DUMP_PREFIX, DumpFileName, DumpFileNameError};
pub use job::BackupJob;
pub use script::{
    DATETIME_FORMAT, SqlValue, TableDump, quote_identifier, quote_string, render_script,
    render_table,
};
pub use stats::{
    BackupStats, STATUS_ERROR, STATUS_NO_BACKUPS, STATUS_PROTECTED, describe_elapsed,
    format_megabytes,
};

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use mockable::Clock;
use tracing::{error, info, warn};

use crate::domain::Error;
use crate::domain::ports::{DumpSource, DumpSourceError, DumpStore, DumpStoreError, StoredDump};
use crate::domain::schedule::{RunGuard, Schedule, describe_offset};

/// Retention used when none is configured.
pub const DEFAULT_KEEP_COUNT: usize = 7;

/// Result of a successful dump creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDump {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// Filename of the new dump.
    pub filename: DumpFileName,
    /// Size formatted as megabytes.
    pub size: String,
    /// Creation time in RFC 3339.
    pub date: String,
    /// Epoch milliseconds embedded in the filename.
    pub timestamp: i64,
}

/// One dump as shown to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    /// Bare filename.
    pub filename: DumpFileName,
    /// Size formatted as megabytes.
    pub size: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub created: DateTime<Utc>,
    /// Sortable epoch milliseconds, taken from the filename when present.
    pub timestamp: i64,
}

impl From<StoredDump> for DumpEntry {
    fn from(stored: StoredDump) -> Self {
        let timestamp = stored
            .filename
            .embedded_timestamp()
            .unwrap_or_else(|| stored.modified.timestamp_millis());
        Self {
            size: format_megabytes(stored.size_bytes),
            size_bytes: stored.size_bytes,
            created: stored.modified,
            timestamp,
            filename: stored.filename,
        }
    }
}

/// Outcome of one create-then-prune pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPassOutcome {
    /// The dump created by the pass.
    pub created: CreatedDump,
    /// Number of old dumps removed by retention.
    pub pruned: usize,
}

/// Description of the automatic backup schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStatus {
    /// Whether scheduled backups run.
    pub enabled: bool,
    /// Human-readable schedule, e.g. `"Daily at 02:00"`.
    pub schedule: String,
    /// Next firing in the schedule's offset, absent when disabled.
    pub next_run: Option<DateTime<FixedOffset>>,
    /// Offset label, e.g. `"UTC+05:30"`.
    pub timezone: String,
}

/// Backup configuration carried by the service.
#[derive(Debug, Clone, Copy)]
pub struct BackupPolicy {
    /// Dumps retained by each pass.
    pub keep_count: usize,
    /// Automatic schedule.
    pub schedule: Schedule,
    /// Whether the schedule is active.
    pub schedule_enabled: bool,
    /// Offset the schedule is evaluated in.
    pub offset: FixedOffset,
}

/// Dump exporter and dump directory manager.
pub struct BackupService {
    source: Arc<dyn DumpSource>,
    store: Arc<dyn DumpStore>,
    clock: Arc<dyn Clock>,
    policy: BackupPolicy,
    last_timestamp: Mutex<i64>,
    guard: RunGuard,
}

impl BackupService {
    /// Create a service over the given ports.
    pub fn new(
        source: Arc<dyn DumpSource>,
        store: Arc<dyn DumpStore>,
        clock: Arc<dyn Clock>,
        policy: BackupPolicy,
    ) -> Self {
        Self {
            source,
            store,
            clock,
            policy,
            last_timestamp: Mutex::new(i64::MIN),
            guard: RunGuard::default(),
        }
    }

    /// Configured backup policy.
    pub fn policy(&self) -> BackupPolicy {
        self.policy
    }

    /// Reserve a timestamp strictly greater than any previously handed out.
    fn next_timestamp(&self, now: DateTime<Utc>) -> i64 {
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let candidate = now.timestamp_millis().max(last.saturating_add(1));
        *last = candidate;
        candidate
    }

    /// Dump every table of the primary database into a new file.
    pub async fn create_dump(&self) -> Result<CreatedDump, Error> {
        let tables = self.source.list_tables().await.map_err(map_source_error)?;
        let mut dumps = Vec::with_capacity(tables.len());
        for table in &tables {
            dumps.push(self.source.load_table(table).await.map_err(map_source_error)?);
        }

        let created_at = self.clock.utc();
        let timestamp = self.next_timestamp(created_at);
        let filename = DumpFileName::for_timestamp(timestamp);
        let script = render_script(&self.source.database_name(), created_at, &dumps);
        let size_bytes = self
            .store
            .write_atomically(&filename, script.as_bytes())
            .await
            .map_err(|err| {
                error!(filename = %filename, error = %err, "writing dump failed");
                Error::internal_public("backup failed: could not write the dump file")
            })?;

        info!(
            filename = %filename,
            tables = dumps.len(),
            size_bytes,
            "database dump created"
        );
        Ok(CreatedDump {
            success: true,
            filename,
            size: format_megabytes(size_bytes),
            date: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp,
        })
    }

    async fn sorted_entries(&self) -> Result<Vec<DumpEntry>, DumpStoreError> {
        let mut entries: Vec<DumpEntry> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(DumpEntry::from)
            .collect();
        entries.sort_by(|a, b| {
            b.created
                .cmp(&a.created)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        Ok(entries)
    }

    /// Dumps newest first; storage failures yield an empty list.
    pub async fn list_dumps(&self) -> Vec<DumpEntry> {
        match self.sorted_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "listing dumps failed");
                Vec::new()
            }
        }
    }

    /// Newest dump, if any.
    pub async fn latest_dump(&self) -> Option<DumpEntry> {
        self.list_dumps().await.into_iter().next()
    }

    /// Dashboard summary. Never fails.
    pub async fn stats(&self) -> BackupStats {
        let entries = match self.sorted_entries().await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "computing backup stats failed");
                return BackupStats::degraded();
            }
        };
        let Some(newest) = entries.first() else {
            return BackupStats::empty();
        };
        let total: u64 = entries.iter().map(|entry| entry.size_bytes).sum();
        BackupStats {
            last_backup: describe_elapsed(newest.created, self.clock.utc()),
            total_size: format_megabytes(total),
            count: entries.len(),
            status: STATUS_PROTECTED.to_owned(),
        }
    }

    /// Absolute path of a validated dump inside the backup directory.
    pub fn resolve_path(&self, filename: &DumpFileName) -> PathBuf {
        self.store.resolve(filename)
    }

    /// Keep the `keep_count` newest dumps and delete the rest.
    ///
    /// Returns how many files were removed. Files deleted before a failure
    /// stay deleted.
    pub async fn prune(&self, keep_count: usize) -> Result<usize, Error> {
        let entries = self.sorted_entries().await.map_err(|err| {
            error!(error = %err, "listing dumps for pruning failed");
            Error::internal_public("prune failed: could not list dumps")
        })?;
        let mut deleted = 0;
        for entry in entries.iter().skip(keep_count) {
            match self.store.remove(&entry.filename).await {
                Ok(()) | Err(DumpStoreError::NotFound { .. }) => deleted += 1,
                Err(err) => {
                    error!(filename = %entry.filename, error = %err, "pruning dump failed");
                    return Err(Error::internal_public(format!(
                        "prune failed: could not delete {}",
                        entry.filename
                    )));
                }
            }
        }
        if deleted > 0 {
            info!(deleted, keep_count, "old dumps pruned");
        }
        Ok(deleted)
    }

    /// Delete one dump named by untrusted input.
    pub async fn delete_dump(&self, raw: &str) -> Result<DumpFileName, Error> {
        let filename = parse_filename(raw)?;
        self.store
            .remove(&filename)
            .await
            .map_err(|err| map_store_error(err, "delete", &filename))?;
        info!(filename = %filename, "dump deleted");
        Ok(filename)
    }

    /// Validate untrusted input and return the path of an existing dump.
    pub async fn download_path(&self, raw: &str) -> Result<PathBuf, Error> {
        let filename = parse_filename(raw)?;
        let exists = self
            .store
            .exists(&filename)
            .await
            .map_err(|err| map_store_error(err, "download", &filename))?;
        if !exists {
            return Err(Error::not_found(format!("backup {filename} not found")));
        }
        Ok(self.resolve_path(&filename))
    }

    /// Create one dump and apply retention, unless a pass is already running.
    pub async fn run_backup_pass(&self) -> Result<BackupPassOutcome, Error> {
        let Some(_permit) = self.guard.try_acquire() else {
            return Err(Error::conflict("a backup pass is already running"));
        };
        let created = self.create_dump().await?;
        let pruned = self.prune(self.policy.keep_count).await?;
        Ok(BackupPassOutcome { created, pruned })
    }

    /// Whether a backup pass is in flight.
    pub fn pass_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Current state of the automatic schedule.
    pub fn schedule_status(&self) -> ScheduleStatus {
        let BackupPolicy {
            schedule,
            schedule_enabled,
            offset,
            ..
        } = self.policy;
        let next_run = schedule_enabled.then(|| {
            schedule
                .next_after(self.clock.utc(), offset)
                .with_timezone(&offset)
        });
        ScheduleStatus {
            enabled: schedule_enabled,
            schedule: schedule.describe(),
            next_run,
            timezone: describe_offset(offset),
        }
    }
}

fn parse_filename(raw: &str) -> Result<DumpFileName, Error> {
    Ok(DumpFileName::parse(raw)?)
}

// Driver messages stay in the logs; clients get the failure category.
fn map_source_error(err: DumpSourceError) -> Error {
    error!(error = %err, "reading the primary database failed");
    match err {
        DumpSourceError::Connection { .. } => {
            Error::service_unavailable("backup failed: primary database unavailable")
        }
        DumpSourceError::Query { .. } => {
            Error::internal_public("backup failed: primary database query error")
        }
    }
}

fn map_store_error(err: DumpStoreError, action: &str, filename: &DumpFileName) -> Error {
    match err {
        DumpStoreError::NotFound { filename } => {
            Error::not_found(format!("backup {filename} not found"))
        }
        DumpStoreError::Io { .. } => {
            error!(filename = %filename, error = %err, "{action} of dump failed");
            Error::internal_public(format!(
                "{action} failed: could not access backup {filename}"
            ))
        }
    }
}

#[cfg(test)]
mod tests;
