//! Tests for backup HTTP handlers.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::domain::backup::{BackupPolicy, BackupService, DumpFileName};
use crate::domain::mirror::MirrorSyncService;
use crate::domain::ports::{
    DumpSource, DumpSourceError, DumpStore, FixtureDumpSource, FixtureDumpStore,
    FixtureMirrorSource, FixtureMirrorStore, MockDumpSource,
};
use crate::domain::schedule::Schedule;
use crate::inbound::http::api_routes;
use crate::test_support::MutableClock;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0)
        .single()
        .expect("valid time")
}

struct Harness {
    store: Arc<FixtureDumpStore>,
    state: HttpState,
}

#[fixture]
fn harness() -> Harness {
    harness_over(Arc::new(FixtureDumpSource))
}

fn harness_over(source: Arc<dyn DumpSource>) -> Harness {
    let clock = Arc::new(MutableClock::new(now()));
    let store = Arc::new(FixtureDumpStore::default());
    store.set_modified(now());
    let policy = BackupPolicy {
        keep_count: 2,
        schedule: Schedule::daily_at(2, 0).expect("valid schedule"),
        schedule_enabled: true,
        offset: FixedOffset::east_opt(0).expect("utc offset"),
    };
    let backups = Arc::new(BackupService::new(
        source,
        store.clone(),
        clock.clone(),
        policy,
    ));
    let mirror = Arc::new(MirrorSyncService::new(
        Arc::new(FixtureMirrorSource),
        Arc::new(FixtureMirrorStore::default()),
        clock,
    ));
    Harness {
        store,
        state: HttpState::new(backups, mirror),
    }
}

fn name(raw: &str) -> DumpFileName {
    DumpFileName::parse(raw).expect("valid dump name")
}

fn seed(store: &FixtureDumpStore, raw: &str, hours_ago: i64) {
    store.insert(
        name(raw),
        b"-- dump\n",
        now() - chrono::TimeDelta::hours(hours_ago),
    );
}

async fn call(state: HttpState, request: actix_test::TestRequest) -> (StatusCode, Value) {
    let app = actix_test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .service(web::scope("/api/v1").configure(api_routes)),
    )
    .await;
    let response = actix_test::call_service(&app, request.to_request()).await;
    let status = response.status();
    let body = actix_test::read_body(response).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("JSON body")
    };
    (status, value)
}

#[rstest]
#[actix_web::test]
async fn create_returns_the_new_dump(harness: Harness) {
    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::post().uri("/api/v1/backup/create"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["filename"], json!("backup_1717228800000.sql"));
    assert_eq!(body["timestamp"], json!(1_717_228_800_000_i64));
    assert_eq!(body["date"], json!("2024-06-01T08:00:00.000Z"));
    assert!(harness.store.contents(&name("backup_1717228800000.sql")).is_some());
}

#[rstest]
#[case(
    DumpSourceError::query("Table 'shop.x' doesn't exist"),
    StatusCode::INTERNAL_SERVER_ERROR,
    "backup failed: primary database query error"
)]
#[case(
    DumpSourceError::connection("Can't connect to MySQL server on '10.0.0.5'"),
    StatusCode::SERVICE_UNAVAILABLE,
    "backup failed: primary database unavailable"
)]
#[actix_web::test]
async fn create_failures_describe_the_cause_without_driver_detail(
    #[case] failure: DumpSourceError,
    #[case] expected_status: StatusCode,
    #[case] expected_message: &str,
) {
    let mut source = MockDumpSource::new();
    source.expect_database_name().return_const("shop".to_owned());
    source.expect_list_tables().return_once(move || Err(failure));
    let harness = harness_over(Arc::new(source));

    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::post().uri("/api/v1/backup/create"),
    )
    .await;

    assert_eq!(status, expected_status);
    assert_eq!(body["message"], json!(expected_message));
    let stored = harness.store.list().await.expect("fixture store lists");
    assert!(stored.is_empty());
}

#[rstest]
#[actix_web::test]
async fn stats_for_an_empty_directory(harness: Harness) {
    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::get().uri("/api/v1/backup/stats"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"lastBackup": "Never", "totalSize": "0 MB", "count": 0, "status": "No Backups"})
    );
}

#[rstest]
#[actix_web::test]
async fn latest_is_null_without_dumps(harness: Harness) {
    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::get().uri("/api/v1/backup/latest"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[rstest]
#[actix_web::test]
async fn list_is_newest_first(harness: Harness) {
    seed(&harness.store, "backup_1.sql", 5);
    seed(&harness.store, "backup_2.sql", 1);
    seed(&harness.store, "backup_3.sql", 3);

    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::get().uri("/api/v1/backup/list"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["filename"].as_str())
        .collect();
    assert_eq!(names, vec!["backup_2.sql", "backup_3.sql", "backup_1.sql"]);
    assert_eq!(body[0]["sizeBytes"], json!(8));
}

#[rstest]
#[case("/api/v1/backup/download/..%2F..%2Fetc%2Fpasswd.sql")]
#[case("/api/v1/backup/download/..passwd.sql")]
#[case("/api/v1/backup/download/notes.txt")]
#[actix_web::test]
async fn download_rejects_unsafe_names(harness: Harness, #[case] uri: &str) {
    let (status, body) = call(harness.state, actix_test::TestRequest::get().uri(uri)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("invalid_request"));
}

#[rstest]
#[actix_web::test]
async fn download_of_missing_dump_is_not_found(harness: Harness) {
    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::get().uri("/api/v1/backup/download/backup_9.sql"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("not_found"));
}

#[rstest]
#[actix_web::test]
async fn delete_removes_one_dump(harness: Harness) {
    seed(&harness.store, "backup_1.sql", 1);
    let store = harness.store.clone();

    let (status, body) = call(
        harness.state.clone(),
        actix_test::TestRequest::delete().uri("/api/v1/backup/file/backup_1.sql"),
    )
    .await;
    let (again, _) = call(
        harness.state,
        actix_test::TestRequest::delete().uri("/api/v1/backup/file/backup_1.sql"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": "backup_1.sql"}));
    assert!(store.contents(&name("backup_1.sql")).is_none());
    assert_eq!(again, StatusCode::NOT_FOUND);
}

#[rstest]
#[case("/api/v1/backup/clean", 1)]
#[case("/api/v1/backup/clean?keep=1", 2)]
#[case("/api/v1/backup/clean?keep=10", 0)]
#[case("/api/v1/backup/clean?keep=0", 3)]
#[actix_web::test]
async fn clean_prunes_to_retention(harness: Harness, #[case] uri: &str, #[case] deleted: usize) {
    seed(&harness.store, "backup_1.sql", 3);
    seed(&harness.store, "backup_2.sql", 2);
    seed(&harness.store, "backup_3.sql", 1);

    let (status, body) = call(harness.state, actix_test::TestRequest::delete().uri(uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": deleted }));
}

#[rstest]
#[actix_web::test]
async fn schedule_status_reports_next_run(harness: Harness) {
    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::get().uri("/api/v1/backup/schedule/status"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "enabled": true,
            "schedule": "Daily at 02:00",
            "nextRun": "2024-06-02T02:00:00+00:00",
            "timezone": "UTC",
        })
    );
}

#[rstest]
#[actix_web::test]
async fn trigger_creates_and_prunes(harness: Harness) {
    seed(&harness.store, "backup_1.sql", 3);
    seed(&harness.store, "backup_2.sql", 2);

    let (status, body) = call(
        harness.state,
        actix_test::TestRequest::post().uri("/api/v1/backup/schedule/trigger"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"]["filename"], json!("backup_1717228800000.sql"));
    assert_eq!(body["pruned"], json!(1));
    assert!(harness.store.contents(&name("backup_1.sql")).is_none());
}
