//! Mirror sync HTTP handlers.
//!
//! ```text
//! GET  /api/v1/mirror/status
//! POST /api/v1/mirror/sync
//! ```

use actix_web::{get, post, web};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::mirror::{SyncReport, TableSyncOutcome, TableSyncReport};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Outcome of one table in a pass.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableSyncResponse {
    #[schema(example = "brand")]
    pub table: String,
    /// One of `mirrored`, `skipped_empty`, `cleared`, `failed`.
    #[schema(example = "mirrored")]
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<TableSyncReport> for TableSyncResponse {
    fn from(value: TableSyncReport) -> Self {
        let table = value.table.name().to_owned();
        let (outcome, rows, error) = match value.outcome {
            TableSyncOutcome::Mirrored { rows } => ("mirrored", Some(rows), None),
            TableSyncOutcome::SkippedEmpty => ("skipped_empty", None, None),
            TableSyncOutcome::Cleared => ("cleared", None, None),
            TableSyncOutcome::Failed { message } => ("failed", None, Some(message)),
        };
        Self {
            table,
            outcome: outcome.to_owned(),
            rows,
            error,
        }
    }
}

/// Summary of one full mirror pass.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncReportResponse {
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub failures: usize,
    pub tables: Vec<TableSyncResponse>,
}

impl From<SyncReport> for SyncReportResponse {
    fn from(value: SyncReport) -> Self {
        let failures = value.failures();
        Self {
            started_at: value.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at: value.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms: value.duration_ms,
            failures,
            tables: value.tables.into_iter().map(Into::into).collect(),
        }
    }
}

/// Report of the most recent pass, or `null` before the first one.
#[utoipa::path(
    get,
    path = "/api/v1/mirror/status",
    responses((status = 200, description = "Last mirror pass", body = Option<SyncReportResponse>)),
    tags = ["mirror"],
    operation_id = "getMirrorStatus"
)]
#[get("/mirror/status")]
pub async fn mirror_status(state: web::Data<HttpState>) -> web::Json<Option<SyncReportResponse>> {
    web::Json(state.mirror.last_report().map(Into::into))
}

/// Run a full mirror pass now.
#[utoipa::path(
    post,
    path = "/api/v1/mirror/sync",
    responses(
        (status = 200, description = "Pass finished", body = SyncReportResponse),
        (status = 409, description = "A pass is already running", body = ErrorSchema)
    ),
    tags = ["mirror"],
    operation_id = "syncMirror"
)]
#[post("/mirror/sync")]
pub async fn sync_mirror(state: web::Data<HttpState>) -> ApiResult<web::Json<SyncReportResponse>> {
    let report = state.mirror.try_sync_all().await?;
    Ok(web::Json(report.into()))
}
