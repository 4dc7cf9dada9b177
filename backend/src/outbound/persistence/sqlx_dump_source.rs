//! `sqlx` adapter reading arbitrary MySQL tables for dumps.
//!
//! Dumps cover every table, so rows are decoded dynamically from the column
//! type the server reports rather than through static mappings.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::domain::backup::{SqlValue, TableDump, quote_identifier};
use crate::domain::ports::{DumpSource, DumpSourceError};

const LIST_TABLES: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS table_name \
     FROM information_schema.tables \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_NAME";

/// How a column's values are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Binary,
    Text,
}

impl ColumnKind {
    /// Classify a server-reported type name such as `INT UNSIGNED`.
    fn from_type_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        let (base, unsigned) = match upper.strip_suffix(" UNSIGNED") {
            Some(base) => (base, true),
            None => (upper.as_str(), false),
        };
        match base {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" if unsigned => {
                Self::Unsigned
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => Self::Signed,
            "FLOAT" => Self::Float,
            "DOUBLE" => Self::Double,
            "DECIMAL" => Self::Decimal,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => Self::Binary,
            _ => Self::Text,
        }
    }
}

/// Widen a `FLOAT` through its shortest decimal form, so `0.1` stays `0.1`
/// instead of gaining the binary expansion of the nearest `f32`.
fn widen_float(value: f32) -> f64 {
    value
        .to_string()
        .parse()
        .unwrap_or_else(|_| f64::from(value))
}

fn decode_value(row: &MySqlRow, index: usize, kind: ColumnKind) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }
    let value = match kind {
        ColumnKind::Bool => SqlValue::Bool(row.try_get::<bool, _>(index)?),
        ColumnKind::Signed => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        ColumnKind::Unsigned => SqlValue::UInt(row.try_get_unchecked::<u64, _>(index)?),
        ColumnKind::Float => SqlValue::Float(widen_float(row.try_get::<f32, _>(index)?)),
        ColumnKind::Double => SqlValue::Float(row.try_get::<f64, _>(index)?),
        ColumnKind::Decimal => SqlValue::Decimal(row.try_get_unchecked::<String, _>(index)?),
        ColumnKind::Date => SqlValue::Date(row.try_get::<NaiveDate, _>(index)?),
        ColumnKind::Time => SqlValue::Time(row.try_get::<NaiveTime, _>(index)?),
        ColumnKind::DateTime => SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
        ColumnKind::Binary => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        ColumnKind::Text => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn map_sqlx_error(error: sqlx::Error) -> DumpSourceError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DumpSourceError::connection(error.to_string()),
        other => DumpSourceError::query(other.to_string()),
    }
}

/// Dump source over an `sqlx` MySQL pool.
#[derive(Clone)]
pub struct SqlxDumpSource {
    pool: MySqlPool,
    database: String,
}

impl SqlxDumpSource {
    /// Create a source reading `database` through `pool`.
    pub fn new(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }
}

#[async_trait]
impl DumpSource for SqlxDumpSource {
    fn database_name(&self) -> String {
        self.database.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>, DumpSourceError> {
        let rows = sqlx::query(LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlx_error)
    }

    async fn load_table(&self, table: &str) -> Result<TableDump, DumpSourceError> {
        let identifier = quote_identifier(table);
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;

        let create_row = sqlx::query(&format!("SHOW CREATE TABLE {identifier}"))
            .fetch_one(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        let create_statement = create_row
            .try_get_unchecked::<String, _>(1)
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query(&format!("SELECT * FROM {identifier}"))
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let (columns, kinds): (Vec<String>, Vec<ColumnKind>) = match rows.first() {
            Some(first) => first
                .columns()
                .iter()
                .map(|column| {
                    (
                        column.name().to_owned(),
                        ColumnKind::from_type_name(column.type_info().name()),
                    )
                })
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };

        let values = rows
            .iter()
            .map(|row| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(index, kind)| decode_value(row, index, *kind))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                DumpSourceError::query(format!("decoding rows of {table} failed: {err}"))
            })?;

        debug!(table, rows = values.len(), "table loaded for dump");
        Ok(TableDump {
            name: table.to_owned(),
            create_statement,
            columns,
            rows: values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("BOOLEAN", ColumnKind::Bool)]
    #[case("INT", ColumnKind::Signed)]
    #[case("BIGINT UNSIGNED", ColumnKind::Unsigned)]
    #[case("tinyint unsigned", ColumnKind::Unsigned)]
    #[case("DECIMAL", ColumnKind::Decimal)]
    #[case("DATETIME", ColumnKind::DateTime)]
    #[case("TIMESTAMP", ColumnKind::DateTime)]
    #[case("LONGBLOB", ColumnKind::Binary)]
    #[case("VARCHAR", ColumnKind::Text)]
    #[case("JSON", ColumnKind::Text)]
    #[case("ENUM", ColumnKind::Text)]
    fn type_names_are_classified(#[case] name: &str, #[case] expected: ColumnKind) {
        assert_eq!(ColumnKind::from_type_name(name), expected);
    }

    #[rstest]
    #[case(0.1, "0.1")]
    #[case(19.99, "19.99")]
    #[case(-3.5, "-3.5")]
    #[case(1.0e-7, "0.0000001")]
    fn floats_keep_their_displayed_value(#[case] stored: f32, #[case] literal: &str) {
        assert_eq!(SqlValue::Float(widen_float(stored)).to_literal(), literal);
    }

    #[rstest]
    fn pool_exhaustion_maps_to_connection_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            DumpSourceError::Connection { .. }
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            DumpSourceError::Query { .. }
        ));
    }
}
