//! Driven port for reading the primary database as a logical dump.

use async_trait::async_trait;

use crate::domain::backup::TableDump;

use super::define_port_error;

define_port_error! {
    /// Errors raised while reading the primary database.
    pub enum DumpSourceError {
        /// The database could not be reached.
        Connection { message: String } =>
            "dump source connection failed: {message}",
        /// A catalogue or data query failed.
        Query { message: String } =>
            "dump source query failed: {message}",
    }
}

/// Port enumerating and reading the tables of the primary database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DumpSource: Send + Sync {
    /// Name of the database being dumped, recorded in the script header.
    fn database_name(&self) -> String;

    /// Base tables in the order they should appear in the script.
    async fn list_tables(&self) -> Result<Vec<String>, DumpSourceError>;

    /// Structure and every row of `table`.
    async fn load_table(&self, table: &str) -> Result<TableDump, DumpSourceError>;
}

/// Fixture source exposing a database with no tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureDumpSource;

#[async_trait]
impl DumpSource for FixtureDumpSource {
    fn database_name(&self) -> String {
        "fixture".to_owned()
    }

    async fn list_tables(&self) -> Result<Vec<String>, DumpSourceError> {
        Ok(Vec::new())
    }

    async fn load_table(&self, table: &str) -> Result<TableDump, DumpSourceError> {
        Err(DumpSourceError::query(format!("unknown table {table}")))
    }
}
