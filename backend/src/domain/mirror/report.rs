//! Per-pass reporting for the mirror syncer.

use chrono::{DateTime, Utc};

use super::MirrorTable;

/// What happened to one table during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSyncOutcome {
    /// Rows were written.
    Mirrored { rows: usize },
    /// The remote snapshot was empty and the local table was left as is.
    SkippedEmpty,
    /// The remote snapshot was empty and the local table was emptied.
    Cleared,
    /// The table could not be synchronised; other tables are unaffected.
    Failed { message: String },
}

impl TableSyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSyncReport {
    pub table: MirrorTable,
    pub outcome: TableSyncOutcome,
}

/// Summary of one full pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub tables: Vec<TableSyncReport>,
}

impl SyncReport {
    /// Outcome recorded for `table`, if the pass reached it.
    pub fn outcome(&self, table: MirrorTable) -> Option<&TableSyncOutcome> {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| &report.outcome)
    }

    /// Number of tables that failed.
    pub fn failures(&self) -> usize {
        self.tables
            .iter()
            .filter(|report| report.outcome.is_failure())
            .count()
    }
}

/// Declared columns missing from one side of the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDrift {
    pub table: MirrorTable,
    pub missing: Vec<String>,
}
