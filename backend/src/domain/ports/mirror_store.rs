//! Driven port for the local mirror database.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::mirror::{ColumnDrift, MirrorBatch, MirrorRows, MirrorTable};

use super::define_port_error;

define_port_error! {
    /// Errors raised by the local mirror.
    pub enum MirrorStoreError {
        /// The mirror database could not be opened.
        Connection { message: String } =>
            "mirror store connection failed: {message}",
        /// A statement or transaction failed; the table is unchanged.
        Write { table: String, message: String } =>
            "mirror store write to {table} failed: {message}",
        /// Schema inspection failed.
        Query { message: String } =>
            "mirror store query failed: {message}",
    }
}

/// Port writing snapshots into the local mirror.
///
/// Each call runs in its own transaction: it either applies fully or leaves
/// the table as it was.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Insert-or-replace every row by primary key. Returns rows written.
    async fn upsert(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError>;

    /// Delete every row of the table, then insert the batch. Returns rows
    /// written.
    async fn replace_all(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError>;

    /// Delete every row of `table`. Returns rows removed.
    async fn clear(&self, table: MirrorTable) -> Result<usize, MirrorStoreError>;

    /// Declared columns absent from the local schema, per table.
    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorStoreError>;
}

/// In-memory mirror for tests and database-less runs.
#[derive(Debug, Default)]
pub struct FixtureMirrorStore {
    tables: Mutex<BTreeMap<MirrorTable, MirrorRows>>,
}

impl FixtureMirrorStore {
    /// Current rows of `table`, if it was ever written.
    pub fn rows(&self, table: MirrorTable) -> Option<MirrorRows> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table)
            .cloned()
    }

    /// Seed `table` directly.
    pub fn seed(&self, batch: MirrorBatch) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(batch.table, batch.rows);
    }
}

#[async_trait]
impl MirrorStore for FixtureMirrorStore {
    async fn upsert(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError> {
        let written = batch.len();
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let current = tables
            .entry(batch.table)
            .or_insert_with(|| batch.table.empty_rows());
        if !current.merge(batch.rows) {
            return Err(MirrorStoreError::write(
                batch.table.name(),
                "row shape does not match table",
            ));
        }
        Ok(written)
    }

    async fn replace_all(&self, batch: MirrorBatch) -> Result<usize, MirrorStoreError> {
        let written = batch.len();
        self.seed(batch);
        Ok(written)
    }

    async fn clear(&self, table: MirrorTable) -> Result<usize, MirrorStoreError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = tables.get(&table).map_or(0, MirrorRows::len);
        tables.insert(table, table.empty_rows());
        Ok(removed)
    }

    async fn missing_columns(&self) -> Result<Vec<ColumnDrift>, MirrorStoreError> {
        Ok(Vec::new())
    }
}
