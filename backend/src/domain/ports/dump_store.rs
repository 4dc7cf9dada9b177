//! Driven port for the directory holding dump files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::backup::DumpFileName;

use super::define_port_error;

/// Metadata describing one stored dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDump {
    /// Bare filename.
    pub filename: DumpFileName,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

define_port_error! {
    /// Errors raised by dump storage.
    pub enum DumpStoreError {
        /// The named dump does not exist.
        NotFound { filename: String } =>
            "dump {filename} does not exist",
        /// Filesystem access failed.
        Io { message: String } =>
            "dump storage failed: {message}",
    }
}

/// Port for persisting and enumerating dump files.
///
/// Only files carrying the dump extension are visible through this port;
/// in-progress writes are never listed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DumpStore: Send + Sync {
    /// Write `contents` so readers observe either nothing or the whole file.
    ///
    /// Returns the number of bytes written.
    async fn write_atomically(
        &self,
        filename: &DumpFileName,
        contents: &[u8],
    ) -> Result<u64, DumpStoreError>;

    /// All dumps in unspecified order. A missing directory yields an empty
    /// list.
    async fn list(&self) -> Result<Vec<StoredDump>, DumpStoreError>;

    /// Whether `filename` currently exists.
    async fn exists(&self, filename: &DumpFileName) -> Result<bool, DumpStoreError>;

    /// Delete `filename`.
    async fn remove(&self, filename: &DumpFileName) -> Result<(), DumpStoreError>;

    /// Absolute path of `filename` inside the store.
    fn resolve(&self, filename: &DumpFileName) -> PathBuf;
}

/// In-memory store keyed by filename, for tests and offline runs.
///
/// Modification times come from the caller so ordering is deterministic.
#[derive(Debug, Default)]
pub struct FixtureDumpStore {
    files: Mutex<BTreeMap<DumpFileName, (Vec<u8>, DateTime<Utc>)>>,
    next_modified: Mutex<Option<DateTime<Utc>>>,
}

impl FixtureDumpStore {
    /// Set the modification time recorded for subsequent writes.
    pub fn set_modified(&self, modified: DateTime<Utc>) {
        *self
            .next_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(modified);
    }

    /// Insert a file directly, bypassing the write path.
    pub fn insert(&self, filename: DumpFileName, contents: &[u8], modified: DateTime<Utc>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filename, (contents.to_vec(), modified));
    }

    /// Contents of `filename`, if stored.
    pub fn contents(&self, filename: &DumpFileName) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .map(|(bytes, _)| bytes.clone())
    }
}

#[async_trait]
impl DumpStore for FixtureDumpStore {
    async fn write_atomically(
        &self,
        filename: &DumpFileName,
        contents: &[u8],
    ) -> Result<u64, DumpStoreError> {
        let modified = self
            .next_modified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(Utc::now);
        self.insert(filename.clone(), contents, modified);
        Ok(contents.len() as u64)
    }

    async fn list(&self) -> Result<Vec<StoredDump>, DumpStoreError> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(files
            .iter()
            .map(|(filename, (bytes, modified))| StoredDump {
                filename: filename.clone(),
                size_bytes: bytes.len() as u64,
                modified: *modified,
            })
            .collect())
    }

    async fn exists(&self, filename: &DumpFileName) -> Result<bool, DumpStoreError> {
        Ok(self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(filename))
    }

    async fn remove(&self, filename: &DumpFileName) -> Result<(), DumpStoreError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(filename)
            .map(|_| ())
            .ok_or_else(|| DumpStoreError::not_found(filename.as_str()))
    }

    fn resolve(&self, filename: &DumpFileName) -> PathBuf {
        PathBuf::from("memory").join(filename.as_str())
    }
}
