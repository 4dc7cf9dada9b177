//! HTTP inbound adapter exposing REST endpoints.

use actix_web::web;

pub mod backup;
pub mod error;
pub mod health;
pub mod mirror;
pub mod schemas;
pub mod state;

pub use error::ApiResult;

/// Register every `/api/v1` endpoint on `cfg`.
///
/// Callers mount this inside the versioned scope:
/// `web::scope("/api/v1").configure(api_routes)`.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backup::create_backup)
        .service(backup::backup_stats)
        .service(backup::latest_backup)
        .service(backup::list_backups)
        .service(backup::download_backup)
        .service(backup::clean_backups)
        .service(backup::delete_backup)
        .service(backup::schedule_status)
        .service(backup::trigger_backup)
        .service(mirror::mirror_status)
        .service(mirror::sync_mirror);
}
