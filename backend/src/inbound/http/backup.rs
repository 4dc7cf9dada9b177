//! Backup HTTP handlers.
//!
//! ```text
//! POST   /api/v1/backup/create
//! GET    /api/v1/backup/stats
//! GET    /api/v1/backup/latest
//! GET    /api/v1/backup/list
//! GET    /api/v1/backup/download/{filename}
//! DELETE /api/v1/backup/clean?keep=N
//! DELETE /api/v1/backup/file/{filename}
//! GET    /api/v1/backup/schedule/status
//! POST   /api/v1/backup/schedule/trigger
//! ```

use std::io;

use actix_web::http::header::{
    CONTENT_TYPE, ContentDisposition, DispositionParam, DispositionType,
};
use actix_web::{HttpResponse, delete, get, post, web};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::domain::Error;
use crate::domain::backup::{
    BackupPassOutcome, BackupStats, CreatedDump, DumpEntry, ScheduleStatus,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Media type of a dump download.
pub const SQL_CONTENT_TYPE: &str = "application/sql";

/// Response payload for a newly created dump.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDumpResponse {
    pub success: bool,
    #[schema(example = "backup_1718000000000.sql")]
    pub filename: String,
    #[schema(example = "1.25 MB")]
    pub size: String,
    #[schema(example = "2024-06-10T06:13:20.000Z")]
    pub date: String,
    pub timestamp: i64,
}

impl From<CreatedDump> for CreatedDumpResponse {
    fn from(value: CreatedDump) -> Self {
        Self {
            success: value.success,
            filename: value.filename.into_inner(),
            size: value.size,
            date: value.date,
            timestamp: value.timestamp,
        }
    }
}

/// One dump in a listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DumpEntryResponse {
    pub filename: String,
    pub size: String,
    pub size_bytes: u64,
    /// Modification time in RFC 3339.
    pub created: String,
    pub timestamp: i64,
}

impl From<DumpEntry> for DumpEntryResponse {
    fn from(value: DumpEntry) -> Self {
        Self {
            filename: value.filename.into_inner(),
            size: value.size,
            size_bytes: value.size_bytes,
            created: value.created.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp: value.timestamp,
        }
    }
}

/// Dashboard summary of the backup directory.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatsResponse {
    #[schema(example = "3 hours ago")]
    pub last_backup: String,
    #[schema(example = "12.40 MB")]
    pub total_size: String,
    pub count: usize,
    #[schema(example = "Protected")]
    pub status: String,
}

impl From<BackupStats> for BackupStatsResponse {
    fn from(value: BackupStats) -> Self {
        Self {
            last_backup: value.last_backup,
            total_size: value.total_size,
            count: value.count,
            status: value.status,
        }
    }
}

/// Number of dumps removed by a prune.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PruneResponse {
    pub deleted: usize,
}

/// Name of a dump removed on request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedDumpResponse {
    pub deleted: String,
}

/// Automatic backup schedule.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStatusResponse {
    pub enabled: bool,
    #[schema(example = "Daily at 02:00")]
    pub schedule: String,
    /// Next run in RFC 3339 with the schedule's offset.
    pub next_run: Option<String>,
    #[schema(example = "UTC")]
    pub timezone: String,
}

impl From<ScheduleStatus> for ScheduleStatusResponse {
    fn from(value: ScheduleStatus) -> Self {
        Self {
            enabled: value.enabled,
            schedule: value.schedule,
            next_run: value
                .next_run
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, false)),
            timezone: value.timezone,
        }
    }
}

/// Result of a manually triggered backup pass.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupPassResponse {
    pub created: CreatedDumpResponse,
    pub pruned: usize,
}

impl From<BackupPassOutcome> for BackupPassResponse {
    fn from(value: BackupPassOutcome) -> Self {
        Self {
            created: value.created.into(),
            pruned: value.pruned,
        }
    }
}

/// Query string accepted by the prune endpoint.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PruneQuery {
    /// Dumps to retain; defaults to the configured retention.
    pub keep: Option<usize>,
}

/// Create a dump of the primary database.
#[utoipa::path(
    post,
    path = "/api/v1/backup/create",
    responses(
        (status = 200, description = "Dump created", body = CreatedDumpResponse),
        (status = 500, description = "Dump failed", body = ErrorSchema),
        (status = 503, description = "Primary database unavailable", body = ErrorSchema)
    ),
    tags = ["backup"],
    operation_id = "createBackup"
)]
#[post("/backup/create")]
pub async fn create_backup(state: web::Data<HttpState>) -> ApiResult<web::Json<CreatedDumpResponse>> {
    let created = state.backups.create_dump().await?;
    Ok(web::Json(created.into()))
}

/// Summarise the backup directory.
#[utoipa::path(
    get,
    path = "/api/v1/backup/stats",
    responses((status = 200, description = "Backup statistics", body = BackupStatsResponse)),
    tags = ["backup"],
    operation_id = "getBackupStats"
)]
#[get("/backup/stats")]
pub async fn backup_stats(state: web::Data<HttpState>) -> web::Json<BackupStatsResponse> {
    web::Json(state.backups.stats().await.into())
}

/// Newest dump, or `null` when there is none.
#[utoipa::path(
    get,
    path = "/api/v1/backup/latest",
    responses((status = 200, description = "Newest dump", body = Option<DumpEntryResponse>)),
    tags = ["backup"],
    operation_id = "getLatestBackup"
)]
#[get("/backup/latest")]
pub async fn latest_backup(state: web::Data<HttpState>) -> web::Json<Option<DumpEntryResponse>> {
    web::Json(state.backups.latest_dump().await.map(Into::into))
}

/// All dumps, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/backup/list",
    responses((status = 200, description = "Dumps newest first", body = [DumpEntryResponse])),
    tags = ["backup"],
    operation_id = "listBackups"
)]
#[get("/backup/list")]
pub async fn list_backups(state: web::Data<HttpState>) -> web::Json<Vec<DumpEntryResponse>> {
    web::Json(
        state
            .backups
            .list_dumps()
            .await
            .into_iter()
            .map(Into::into)
            .collect(),
    )
}

/// Stream one dump as an attachment.
#[utoipa::path(
    get,
    path = "/api/v1/backup/download/{filename}",
    params(("filename" = String, Path, description = "Dump filename")),
    responses(
        (status = 200, description = "Dump contents", content_type = "application/sql", body = String),
        (status = 400, description = "Invalid filename", body = ErrorSchema),
        (status = 404, description = "Dump not found", body = ErrorSchema)
    ),
    tags = ["backup"],
    operation_id = "downloadBackup"
)]
#[get("/backup/download/{filename}")]
pub async fn download_backup(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let raw = path.into_inner();
    let file_path = state.backups.download_path(&raw).await?;
    let file = tokio::fs::File::open(&file_path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            Error::not_found(format!("backup {raw} not found"))
        } else {
            warn!(error = %err, path = %file_path.display(), "opening dump failed");
            Error::internal_public(format!("download failed: could not open backup {raw}"))
        }
    })?;

    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, SQL_CONTENT_TYPE))
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(raw)],
        })
        .streaming(ReaderStream::new(file)))
}

/// Delete all but the newest dumps.
#[utoipa::path(
    delete,
    path = "/api/v1/backup/clean",
    params(PruneQuery),
    responses(
        (status = 200, description = "Old dumps removed", body = PruneResponse),
        (status = 500, description = "Prune failed", body = ErrorSchema)
    ),
    tags = ["backup"],
    operation_id = "cleanBackups"
)]
#[delete("/backup/clean")]
pub async fn clean_backups(
    state: web::Data<HttpState>,
    query: web::Query<PruneQuery>,
) -> ApiResult<web::Json<PruneResponse>> {
    let keep = query.keep.unwrap_or(state.backups.policy().keep_count);
    let deleted = state.backups.prune(keep).await?;
    Ok(web::Json(PruneResponse { deleted }))
}

/// Delete one dump.
#[utoipa::path(
    delete,
    path = "/api/v1/backup/file/{filename}",
    params(("filename" = String, Path, description = "Dump filename")),
    responses(
        (status = 200, description = "Dump deleted", body = DeletedDumpResponse),
        (status = 400, description = "Invalid filename", body = ErrorSchema),
        (status = 404, description = "Dump not found", body = ErrorSchema)
    ),
    tags = ["backup"],
    operation_id = "deleteBackup"
)]
#[delete("/backup/file/{filename}")]
pub async fn delete_backup(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<web::Json<DeletedDumpResponse>> {
    let deleted = state.backups.delete_dump(&path.into_inner()).await?;
    Ok(web::Json(DeletedDumpResponse {
        deleted: deleted.into_inner(),
    }))
}

/// Describe the automatic backup schedule.
#[utoipa::path(
    get,
    path = "/api/v1/backup/schedule/status",
    responses((status = 200, description = "Schedule status", body = ScheduleStatusResponse)),
    tags = ["backup"],
    operation_id = "getBackupSchedule"
)]
#[get("/backup/schedule/status")]
pub async fn schedule_status(state: web::Data<HttpState>) -> web::Json<ScheduleStatusResponse> {
    web::Json(state.backups.schedule_status().into())
}

/// Run one create-then-prune pass now.
#[utoipa::path(
    post,
    path = "/api/v1/backup/schedule/trigger",
    responses(
        (status = 200, description = "Pass completed", body = BackupPassResponse),
        (status = 409, description = "A pass is already running", body = ErrorSchema),
        (status = 500, description = "Pass failed", body = ErrorSchema)
    ),
    tags = ["backup"],
    operation_id = "triggerBackup"
)]
#[post("/backup/schedule/trigger")]
pub async fn trigger_backup(
    state: web::Data<HttpState>,
) -> ApiResult<web::Json<BackupPassResponse>> {
    let outcome = state.backups.run_backup_pass().await?;
    Ok(web::Json(outcome.into()))
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
