//! Validated dump file names.
//!
//! Every filename that reaches the filesystem goes through [`DumpFileName`],
//! so path traversal and foreign file types are rejected before any I/O.

use std::fmt;

/// File extension carried by every dump artifact.
pub const DUMP_EXTENSION: &str = ".sql";

/// Prefix of filenames produced by the exporter.
pub const DUMP_PREFIX: &str = "backup_";

/// Reasons a raw filename is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DumpFileNameError {
    /// Blank input.
    #[error("filename must not be empty")]
    Empty,
    /// Input contains `..` or a path separator.
    #[error("filename must not contain path components")]
    Traversal,
    /// Input does not carry the dump extension.
    #[error("filename must end with {DUMP_EXTENSION}")]
    WrongExtension,
}

/// A bare dump filename such as `backup_1718000000000.sql`.
///
/// ## Invariants
/// - Non-empty, no `..`, no `/`, `\` or NUL characters.
/// - Ends with [`DUMP_EXTENSION`].
///
/// # Examples
/// ```
/// use pos_backend::domain::backup::DumpFileName;
///
/// assert!(DumpFileName::parse("backup_1718000000000.sql").is_ok());
/// assert!(DumpFileName::parse("../../etc/passwd.sql").is_err());
/// assert!(DumpFileName::parse("notes.txt").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DumpFileName(String);

impl DumpFileName {
    /// Validate an untrusted filename.
    pub fn parse(raw: &str) -> Result<Self, DumpFileNameError> {
        if raw.trim().is_empty() {
            return Err(DumpFileNameError::Empty);
        }
        if raw.contains("..") || raw.contains(['/', '\\', '\0']) {
            return Err(DumpFileNameError::Traversal);
        }
        if !raw.ends_with(DUMP_EXTENSION) || raw.len() == DUMP_EXTENSION.len() {
            return Err(DumpFileNameError::WrongExtension);
        }
        Ok(Self(raw.to_owned()))
    }

    /// Name for a dump created at `timestamp_millis` since the Unix epoch.
    pub fn for_timestamp(timestamp_millis: i64) -> Self {
        Self(format!("{DUMP_PREFIX}{timestamp_millis}{DUMP_EXTENSION}"))
    }

    /// Epoch-millisecond timestamp embedded by the exporter, if present.
    pub fn embedded_timestamp(&self) -> Option<i64> {
        self.0
            .strip_prefix(DUMP_PREFIX)?
            .strip_suffix(DUMP_EXTENSION)?
            .parse()
            .ok()
    }

    /// Borrow the filename.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Take ownership of the filename.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DumpFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DumpFileName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("../../etc/passwd.sql", DumpFileNameError::Traversal)]
    #[case("..backup.sql", DumpFileNameError::Traversal)]
    #[case("nested/backup_1.sql", DumpFileNameError::Traversal)]
    #[case("nested\\backup_1.sql", DumpFileNameError::Traversal)]
    #[case("backup_1.sql.gz", DumpFileNameError::WrongExtension)]
    #[case("backup_1.txt", DumpFileNameError::WrongExtension)]
    #[case(".sql", DumpFileNameError::WrongExtension)]
    #[case("   ", DumpFileNameError::Empty)]
    fn parse_rejects_unsafe_names(#[case] raw: &str, #[case] expected: DumpFileNameError) {
        assert_eq!(DumpFileName::parse(raw), Err(expected));
    }

    #[rstest]
    fn parse_accepts_plain_dump_names() {
        let name = DumpFileName::parse("backup_1718000000000.sql").expect("valid name");
        assert_eq!(name.as_str(), "backup_1718000000000.sql");
        assert_eq!(name.embedded_timestamp(), Some(1_718_000_000_000));
    }

    #[rstest]
    fn for_timestamp_round_trips_through_parse() {
        let name = DumpFileName::for_timestamp(42);
        assert_eq!(name.to_string(), "backup_42.sql");
        assert_eq!(DumpFileName::parse(name.as_str()), Ok(name));
    }

    #[rstest]
    fn embedded_timestamp_is_none_for_foreign_names() {
        let name = DumpFileName::parse("manual-export.sql").expect("valid name");
        assert!(name.embedded_timestamp().is_none());
    }
}
