//! Builders choosing adapters for the domain services.
//!
//! With a primary database configured the services read MySQL through the
//! real adapters; otherwise fixture sources keep the HTTP surface usable.

use std::io;
use std::sync::Arc;

use mockable::Clock;
use tracing::warn;

use pos_backend::domain::backup::BackupService;
use pos_backend::domain::mirror::MirrorSyncService;
use pos_backend::domain::ports::{
    DumpSource, FixtureDumpSource, FixtureMirrorSource, MirrorSource,
};
use pos_backend::inbound::http::state::HttpState;
use pos_backend::outbound::filesystem::CapStdDumpStore;
use pos_backend::outbound::persistence::{
    DbPool, DieselMirrorSource, PoolConfig, SqliteMirrorStore, SqlxDumpSource,
};

use super::ServerConfig;

/// Domain services shared by HTTP handlers and scheduled jobs.
#[derive(Clone)]
pub struct Services {
    pub(crate) backups: Arc<BackupService>,
    pub(crate) mirror: Arc<MirrorSyncService>,
}

impl Services {
    pub fn http_state(&self) -> HttpState {
        HttpState::new(self.backups.clone(), self.mirror.clone())
    }
}

fn build_sources(
    config: &ServerConfig,
) -> io::Result<(Arc<dyn DumpSource>, Arc<dyn MirrorSource>)> {
    let Some(database) = &config.database else {
        warn!("POS_DB_NAME is not set; using fixture sources with no tables");
        return Ok((Arc::new(FixtureDumpSource), Arc::new(FixtureMirrorSource)));
    };
    let pool_config = PoolConfig::new(database.url.clone());
    let diesel_pool = DbPool::new(&pool_config);
    let sqlx_pool = pool_config.sqlx_pool().map_err(io::Error::other)?;
    Ok((
        Arc::new(SqlxDumpSource::new(sqlx_pool, database.name.clone())),
        Arc::new(DieselMirrorSource::new(diesel_pool)),
    ))
}

/// Build the backup and mirror services from configuration.
///
/// # Errors
/// Returns [`io::Error`] when a pool cannot be built or the mirror database
/// cannot be opened.
pub fn build_services(config: &ServerConfig, clock: Arc<dyn Clock>) -> io::Result<Services> {
    let (dump_source, mirror_source) = build_sources(config)?;
    let mirror_store = SqliteMirrorStore::open(&config.mirror_db_path).map_err(io::Error::other)?;

    let backups = Arc::new(BackupService::new(
        dump_source,
        Arc::new(CapStdDumpStore::new(config.backup_dir.clone())),
        clock.clone(),
        config.backup_policy,
    ));
    let mirror = Arc::new(MirrorSyncService::new(
        mirror_source,
        Arc::new(mirror_store),
        clock,
    ));
    Ok(Services { backups, mirror })
}
