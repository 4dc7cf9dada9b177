//! Application configuration loaded via OrthoConfig.
//!
//! Every value can come from the command line, a configuration file, or a
//! `POS_`-prefixed environment variable. Unset values fall back to the
//! defaults exposed by the accessor methods.

use std::net::SocketAddr;
use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::backup::{BackupPolicy, DEFAULT_KEEP_COUNT};
use crate::domain::schedule::{Schedule, ScheduleError, utc_offset};
use crate::outbound::persistence::{PoolError, mysql_url};

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_APP_DATA_PATH: &str = "pos-data";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_BACKUP_HOUR: u32 = 2;
const DEFAULT_BACKUP_MINUTE: u32 = 0;
const DEFAULT_MIRROR_INTERVAL_MINUTES: u32 = 5;

/// Name of the dump directory below the application data path.
pub const BACKUP_DIR_NAME: &str = "backups";
/// Name of the mirror database below the application data path.
pub const MIRROR_DB_FILE_NAME: &str = "pos-mirror.sqlite";

/// Errors raised while turning settings into runtime configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The bind address did not parse.
    #[error("invalid bind address {value}: {message}")]
    BindAddr { value: String, message: String },
    /// A schedule value is out of range.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// The database URL could not be assembled.
    #[error(transparent)]
    Database(#[from] PoolError),
}

/// Configuration values for the POS backend.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "POS")]
pub struct AppSettings {
    /// Primary MySQL host.
    pub db_host: Option<String>,
    /// Primary MySQL port.
    pub db_port: Option<u16>,
    /// Primary MySQL user.
    pub db_user: Option<String>,
    /// Primary MySQL password.
    pub db_password: Option<String>,
    /// Primary database name; the primary is considered unconfigured without it.
    pub db_name: Option<String>,
    /// Directory holding dumps and the mirror.
    pub app_data_path: Option<PathBuf>,
    /// Override for the mirror database location.
    pub mirror_db_path: Option<PathBuf>,
    /// HTTP listen address.
    pub bind_addr: Option<String>,
    /// Dumps kept by the scheduled pass.
    pub backup_keep_count: Option<usize>,
    /// Whether the daily backup runs. Environment and file only, so an
    /// absent command-line flag cannot switch it off.
    #[ortho_config(default = true, skip_cli)]
    pub backup_schedule_enabled: bool,
    /// Hour of the daily backup.
    pub backup_hour: Option<u32>,
    /// Minute of the daily backup.
    pub backup_minute: Option<u32>,
    /// Minutes between mirror passes.
    pub mirror_interval_minutes: Option<u32>,
    /// Whether the mirror syncer runs. Environment and file only.
    #[ortho_config(default = true, skip_cli)]
    pub mirror_enabled: bool,
    /// Offset schedules are evaluated in, in minutes east of UTC.
    pub schedule_utc_offset_minutes: Option<i32>,
}

impl AppSettings {
    /// Connection URL of the primary, or `None` when no database is named.
    pub fn database_url(&self) -> Result<Option<String>, SettingsError> {
        let Some(database) = self.db_name.as_deref().filter(|name| !name.trim().is_empty())
        else {
            return Ok(None);
        };
        let url = mysql_url(
            self.db_host.as_deref().unwrap_or(DEFAULT_DB_HOST),
            self.db_port.unwrap_or(DEFAULT_DB_PORT),
            self.db_user.as_deref().unwrap_or(DEFAULT_DB_USER),
            self.db_password.as_deref().unwrap_or_default(),
            database,
        )?;
        Ok(Some(url))
    }

    /// Primary database name, if configured.
    pub fn database_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn app_data_path(&self) -> PathBuf {
        self.app_data_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_DATA_PATH))
    }

    /// Directory dumps are written to.
    pub fn backup_dir(&self) -> PathBuf {
        self.app_data_path().join(BACKUP_DIR_NAME)
    }

    /// Location of the SQLite mirror.
    pub fn mirror_db_path(&self) -> PathBuf {
        self.mirror_db_path
            .clone()
            .unwrap_or_else(|| self.app_data_path().join(MIRROR_DB_FILE_NAME))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value.parse().map_err(|err: std::net::AddrParseError| SettingsError::BindAddr {
            value: value.to_owned(),
            message: err.to_string(),
        })
    }

    /// Retention, schedule and offset for the backup service.
    pub fn backup_policy(&self) -> Result<BackupPolicy, SettingsError> {
        Ok(BackupPolicy {
            keep_count: self.backup_keep_count.unwrap_or(DEFAULT_KEEP_COUNT),
            schedule: Schedule::daily_at(
                self.backup_hour.unwrap_or(DEFAULT_BACKUP_HOUR),
                self.backup_minute.unwrap_or(DEFAULT_BACKUP_MINUTE),
            )?,
            schedule_enabled: self.backup_schedule_enabled,
            offset: utc_offset(self.schedule_utc_offset_minutes.unwrap_or(0))?,
        })
    }

    /// Interval schedule of the mirror syncer.
    pub fn mirror_schedule(&self) -> Result<Schedule, SettingsError> {
        Ok(Schedule::every_minutes(
            self.mirror_interval_minutes
                .unwrap_or(DEFAULT_MIRROR_INTERVAL_MINUTES),
        )?)
    }

    pub fn mirror_enabled(&self) -> bool {
        self.mirror_enabled
    }
}
