//! Driven port for reading mirrored tables from the primary database.

use async_trait::async_trait;

use crate::domain::mirror::{ColumnDrift, MirrorBatch, MirrorTable};

use super::define_port_error;

define_port_error! {
    /// Errors raised while reading from the primary database.
    pub enum MirrorSourceError {
        /// No connection could be obtained.
        Connection { message: String } =>
            "mirror source connection failed: {message}",
        /// A query failed.
        Query { message: String } =>
            "mirror source query failed: {message}",
    }
}

/// Port pulling table snapshots from the primary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorSource: Send + Sync {
    /// Every row of `table`. For the stock table only rows with a positive
    /// quantity are returned.
    async fn fetch(&self, table: MirrorTable) -> Result<MirrorBatch, MirrorSourceError>;

    /// Declared columns absent from the primary schema, per table.
    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorSourceError>;
}

/// Fixture source whose tables are all empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureMirrorSource;

#[async_trait]
impl MirrorSource for FixtureMirrorSource {
    async fn fetch(&self, table: MirrorTable) -> Result<MirrorBatch, MirrorSourceError> {
        Ok(MirrorBatch::new(table, table.empty_rows()))
    }

    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorSourceError> {
        Ok(Vec::new())
    }
}
