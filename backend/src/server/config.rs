//! Runtime server configuration derived from [`AppSettings`].

use std::net::SocketAddr;
use std::path::PathBuf;

use pos_backend::domain::backup::BackupPolicy;
use pos_backend::domain::schedule::Schedule;
use pos_backend::settings::{AppSettings, SettingsError};

/// Connection details of the primary database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub(crate) url: String,
    pub(crate) name: String,
}

/// Validated configuration for creating the server and its background jobs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) backup_dir: PathBuf,
    pub(crate) mirror_db_path: PathBuf,
    pub(crate) database: Option<DatabaseConfig>,
    pub(crate) backup_policy: BackupPolicy,
    pub(crate) mirror_schedule: Schedule,
    pub(crate) mirror_enabled: bool,
}

impl ServerConfig {
    /// Validate settings into a server configuration.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when the bind address, a schedule value or
    /// the database URL is invalid.
    pub fn from_settings(settings: &AppSettings) -> Result<Self, SettingsError> {
        let database = settings
            .database_url()?
            .zip(settings.database_name())
            .map(|(url, name)| DatabaseConfig {
                url,
                name: name.to_owned(),
            });
        Ok(Self {
            bind_addr: settings.bind_addr()?,
            backup_dir: settings.backup_dir(),
            mirror_db_path: settings.mirror_db_path(),
            database,
            backup_policy: settings.backup_policy()?,
            mirror_schedule: settings.mirror_schedule()?,
            mirror_enabled: settings.mirror_enabled(),
        })
    }

    /// Return the socket address the server will bind to.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
