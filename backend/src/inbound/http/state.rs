//! Shared HTTP adapter state.
//!
//! Handlers receive this through `actix_web::web::Data` and only reach the
//! domain services, so they stay testable against fixture ports.

use std::sync::Arc;

use crate::domain::backup::BackupService;
use crate::domain::mirror::MirrorSyncService;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub backups: Arc<BackupService>,
    pub mirror: Arc<MirrorSyncService>,
}

impl HttpState {
    /// Bundle the services behind the HTTP surface.
    pub fn new(backups: Arc<BackupService>, mirror: Arc<MirrorSyncService>) -> Self {
        Self { backups, mirror }
    }
}
