//! Dump directory backed by a capability-scoped `cap-std` handle.
//!
//! All paths are resolved relative to the dump directory, so validated
//! filenames can never escape it. Writes are staged under a hidden name and
//! renamed into place once flushed.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cap_std::{ambient_authority, fs::Dir};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::backup::{DUMP_EXTENSION, DumpFileName};
use crate::domain::ports::{DumpStore, DumpStoreError, StoredDump};

const STAGING_PREFIX: &str = ".tmp-";

/// Dump store rooted at a directory on the local filesystem.
///
/// The directory is created on first write; reads against a missing
/// directory behave as if it were empty.
#[derive(Debug, Clone)]
pub struct CapStdDumpStore {
    root: PathBuf,
}

impl CapStdDumpStore {
    /// Create a store rooted at `root`. No I/O happens until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the dumps.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn blocking<F, T>(&self, work: F) -> Result<T, DumpStoreError>
    where
        F: FnOnce(&Path) -> Result<T, DumpStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || work(&root))
            .await
            .map_err(|err| DumpStoreError::io(format!("dump storage task failed: {err}")))?
    }
}

fn io_error(root: &Path, error: &io::Error) -> DumpStoreError {
    DumpStoreError::io(format!("{}: {error}", root.display()))
}

fn open_existing(root: &Path) -> Result<Option<Dir>, DumpStoreError> {
    match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => Ok(Some(dir)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(root, &err)),
    }
}

fn open_or_create(root: &Path) -> Result<Dir, DumpStoreError> {
    Dir::create_ambient_dir_all(root, ambient_authority()).map_err(|err| io_error(root, &err))?;
    Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| io_error(root, &err))
}

fn write_staged(dir: &Dir, staging: &str, contents: &[u8]) -> io::Result<()> {
    let mut file = dir.create(staging)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn write_file(root: &Path, filename: &DumpFileName, contents: &[u8]) -> Result<u64, DumpStoreError> {
    let dir = open_or_create(root)?;
    let staging = format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple());

    let outcome = write_staged(&dir, &staging, contents)
        .and_then(|()| dir.rename(&staging, &dir, filename.as_str()));
    if let Err(err) = outcome {
        if let Err(cleanup) = dir.remove_file(&staging) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(error = %cleanup, staging, "failed to remove staged dump");
            }
        }
        return Err(io_error(root, &err));
    }
    Ok(contents.len() as u64)
}

fn is_listed(name: &str) -> bool {
    !name.starts_with('.') && name.ends_with(DUMP_EXTENSION)
}

fn list_files(root: &Path) -> Result<Vec<StoredDump>, DumpStoreError> {
    let Some(dir) = open_existing(root)? else {
        return Ok(Vec::new());
    };
    let mut dumps = Vec::new();
    for entry in dir.entries().map_err(|err| io_error(root, &err))? {
        let entry = entry.map_err(|err| io_error(root, &err))?;
        let name = entry.file_name();
        let Some(name) = name.to_str().filter(|name| is_listed(name)) else {
            continue;
        };
        let Ok(filename) = DumpFileName::parse(name) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            // Removed between listing and stat.
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(io_error(root, &err)),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .map_err(|err| io_error(root, &err))?
            .into_std();
        dumps.push(StoredDump {
            filename,
            size_bytes: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }
    Ok(dumps)
}

#[async_trait]
impl DumpStore for CapStdDumpStore {
    async fn write_atomically(
        &self,
        filename: &DumpFileName,
        contents: &[u8],
    ) -> Result<u64, DumpStoreError> {
        let filename = filename.clone();
        let contents = contents.to_vec();
        let written = self
            .blocking(move |root| write_file(root, &filename, &contents))
            .await?;
        debug!(bytes = written, "dump written");
        Ok(written)
    }

    async fn list(&self) -> Result<Vec<StoredDump>, DumpStoreError> {
        self.blocking(list_files).await
    }

    async fn exists(&self, filename: &DumpFileName) -> Result<bool, DumpStoreError> {
        let filename = filename.clone();
        self.blocking(move |root| {
            let Some(dir) = open_existing(root)? else {
                return Ok(false);
            };
            match dir.metadata(filename.as_str()) {
                Ok(metadata) => Ok(metadata.is_file()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(err) => Err(io_error(root, &err)),
            }
        })
        .await
    }

    async fn remove(&self, filename: &DumpFileName) -> Result<(), DumpStoreError> {
        let filename = filename.clone();
        self.blocking(move |root| {
            let Some(dir) = open_existing(root)? else {
                return Err(DumpStoreError::not_found(filename.as_str()));
            };
            match dir.remove_file(filename.as_str()) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    Err(DumpStoreError::not_found(filename.as_str()))
                }
                Err(err) => Err(io_error(root, &err)),
            }
        })
        .await
    }

    fn resolve(&self, filename: &DumpFileName) -> PathBuf {
        self.root.join(filename.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn tempdir() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn name(raw: &str) -> DumpFileName {
        DumpFileName::parse(raw).expect("valid dump name")
    }

    #[rstest]
    #[tokio::test]
    async fn write_creates_directory_and_file(tempdir: TempDir) {
        let root = tempdir.path().join("backups");
        let store = CapStdDumpStore::new(&root);

        let written = store
            .write_atomically(&name("backup_1.sql"), b"-- dump\n")
            .await
            .expect("write");

        assert_eq!(written, 8);
        let on_disk = std::fs::read(root.join("backup_1.sql")).expect("read back");
        assert_eq!(on_disk, b"-- dump\n");
    }

    #[rstest]
    #[tokio::test]
    async fn write_leaves_no_staging_files(tempdir: TempDir) {
        let store = CapStdDumpStore::new(tempdir.path());
        store
            .write_atomically(&name("backup_1.sql"), b"x")
            .await
            .expect("write");

        let names: Vec<String> = std::fs::read_dir(tempdir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["backup_1.sql".to_owned()]);
    }

    #[rstest]
    #[tokio::test]
    async fn list_skips_hidden_and_foreign_files(tempdir: TempDir) {
        let root = tempdir.path();
        std::fs::write(root.join("backup_1.sql"), b"one").expect("seed dump");
        std::fs::write(root.join(".tmp-abc"), b"partial").expect("seed staging");
        std::fs::write(root.join(".hidden.sql"), b"hidden").expect("seed hidden");
        std::fs::write(root.join("notes.txt"), b"notes").expect("seed notes");
        std::fs::create_dir(root.join("nested.sql")).expect("seed dir");
        let store = CapStdDumpStore::new(root);

        let listed = store.list().await.expect("list");

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].filename.as_str(), "backup_1.sql");
        assert_eq!(listed[0].size_bytes, 3);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_directory_lists_nothing(tempdir: TempDir) {
        let store = CapStdDumpStore::new(tempdir.path().join("absent"));

        assert!(store.list().await.expect("list").is_empty());
        assert!(!store.exists(&name("backup_1.sql")).await.expect("exists"));
    }

    #[rstest]
    #[tokio::test]
    async fn remove_reports_missing_files(tempdir: TempDir) {
        let store = CapStdDumpStore::new(tempdir.path());
        store
            .write_atomically(&name("backup_1.sql"), b"x")
            .await
            .expect("write");

        store.remove(&name("backup_1.sql")).await.expect("remove");
        let err = store
            .remove(&name("backup_1.sql"))
            .await
            .expect_err("second remove");

        assert!(matches!(err, DumpStoreError::NotFound { .. }));
        assert!(!store.exists(&name("backup_1.sql")).await.expect("exists"));
    }

    #[rstest]
    fn resolve_joins_the_root() {
        let store = CapStdDumpStore::new("/var/lib/pos/backups");
        assert_eq!(
            store.resolve(&name("backup_7.sql")),
            PathBuf::from("/var/lib/pos/backups/backup_7.sql")
        );
    }
}
