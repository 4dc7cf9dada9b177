//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP endpoint from the inbound layer together
//! with the error schema wrappers, so domain types stay free of utoipa. The
//! generated document backs Swagger UI in debug builds.

use crate::inbound::http::backup::{
    BackupPassResponse, BackupStatsResponse, CreatedDumpResponse, DeletedDumpResponse,
    DumpEntryResponse, PruneResponse, ScheduleStatusResponse,
};
use crate::inbound::http::mirror::{SyncReportResponse, TableSyncResponse};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use utoipa::OpenApi;

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "POS backend API",
        description = "Database dumps, backup scheduling and local mirror synchronisation."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::backup::create_backup,
        crate::inbound::http::backup::backup_stats,
        crate::inbound::http::backup::latest_backup,
        crate::inbound::http::backup::list_backups,
        crate::inbound::http::backup::download_backup,
        crate::inbound::http::backup::clean_backups,
        crate::inbound::http::backup::delete_backup,
        crate::inbound::http::backup::schedule_status,
        crate::inbound::http::backup::trigger_backup,
        crate::inbound::http::mirror::mirror_status,
        crate::inbound::http::mirror::sync_mirror,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        CreatedDumpResponse,
        DumpEntryResponse,
        BackupStatsResponse,
        PruneResponse,
        DeletedDumpResponse,
        ScheduleStatusResponse,
        BackupPassResponse,
        SyncReportResponse,
        TableSyncResponse,
        crate::inbound::http::health::ProbeResponse,
        crate::inbound::http::health::Phase,
    )),
    tags(
        (name = "backup", description = "Database dumps and retention"),
        (name = "mirror", description = "Local mirror synchronisation"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
