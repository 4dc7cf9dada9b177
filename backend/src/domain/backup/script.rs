//! Rendering of logical dumps as a replayable MySQL script.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Timestamp layout used for DATETIME/TIMESTAMP literals.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single column value read from the primary database.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// `TINYINT(1)` / `BOOLEAN`.
    Bool(bool),
    /// Signed integer types.
    Int(i64),
    /// Unsigned integer types.
    UInt(u64),
    /// `FLOAT` / `DOUBLE`.
    Float(f64),
    /// `DECIMAL`, kept in its exact textual form.
    Decimal(String),
    /// Character data, `ENUM`, `SET` and `JSON`.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// `DATE`.
    Date(NaiveDate),
    /// `TIME`.
    Time(NaiveTime),
    /// `DATETIME` / `TIMESTAMP`.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Render the value as an inline SQL literal.
    ///
    /// # Examples
    /// ```
    /// use pos_backend::domain::backup::SqlValue;
    ///
    /// assert_eq!(SqlValue::Null.to_literal(), "NULL");
    /// assert_eq!(SqlValue::Bool(true).to_literal(), "1");
    /// assert_eq!(SqlValue::Text("O'Brien".into()).to_literal(), "'O\\'Brien'");
    /// ```
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_owned(),
            Self::Bool(value) => String::from(if *value { "1" } else { "0" }),
            Self::Int(value) => value.to_string(),
            Self::UInt(value) => value.to_string(),
            Self::Float(value) if value.is_finite() => value.to_string(),
            Self::Float(_) => "NULL".to_owned(),
            Self::Decimal(value) => value.clone(),
            Self::Text(value) => quote_string(value),
            Self::Bytes(bytes) if bytes.is_empty() => "''".to_owned(),
            Self::Bytes(bytes) => {
                let mut literal = String::with_capacity(bytes.len() * 2 + 3);
                literal.push_str("X'");
                for byte in bytes {
                    let _ = write!(literal, "{byte:02X}");
                }
                literal.push('\'');
                literal
            }
            Self::Date(date) => format!("'{}'", date.format("%Y-%m-%d")),
            Self::Time(time) => format!("'{}'", time.format("%H:%M:%S")),
            Self::DateTime(timestamp) => format!("'{}'", timestamp.format(DATETIME_FORMAT)),
        }
    }
}

/// Quote and escape a string using MySQL's backslash escapes.
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\u{1a}' => quoted.push_str("\\Z"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Full schema and data of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDump {
    /// Table name.
    pub name: String,
    /// `CREATE TABLE` statement as reported by the server, without a
    /// trailing semicolon.
    pub create_statement: String,
    /// Column names in select order.
    pub columns: Vec<String>,
    /// Row values; each row has one value per column.
    pub rows: Vec<Vec<SqlValue>>,
}

/// Render the statements recreating one table and its rows.
pub fn render_table(table: &TableDump) -> String {
    let identifier = quote_identifier(&table.name);
    let mut out = String::new();
    let _ = writeln!(out, "--\n-- Table structure for {identifier}\n--\n");
    let _ = writeln!(out, "DROP TABLE IF EXISTS {identifier};");
    let _ = writeln!(out, "{};\n", table.create_statement.trim_end().trim_end_matches(';'));

    if table.rows.is_empty() {
        return out;
    }

    let column_list = table
        .columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "--\n-- Data for {identifier}\n--\n");
    for row in &table.rows {
        let values = row
            .iter()
            .map(SqlValue::to_literal)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "INSERT INTO {identifier} ({column_list}) VALUES ({values});");
    }
    out.push('\n');
    out
}

/// Render a complete dump script.
///
/// Foreign key checks are disabled for the body so tables can be recreated in
/// any order.
pub fn render_script(database: &str, created_at: DateTime<Utc>, tables: &[TableDump]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- POS database backup");
    let _ = writeln!(out, "-- Created: {}", created_at.to_rfc3339());
    let _ = writeln!(out, "-- Database: {database}");
    let _ = writeln!(out, "-- Tables: {}\n", tables.len());
    let _ = writeln!(out, "SET FOREIGN_KEY_CHECKS=0;\n");
    for table in tables {
        out.push_str(&render_table(table));
    }
    let _ = writeln!(out, "SET FOREIGN_KEY_CHECKS=1;");
    out
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
