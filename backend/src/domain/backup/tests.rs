//! Behavioural tests for the dump exporter.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{FixtureDumpStore, MockDumpSource, MockDumpStore};
use crate::domain::schedule::utc_offset;
use crate::test_support::MutableClock;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid time")
}

fn policy(keep_count: usize) -> BackupPolicy {
    BackupPolicy {
        keep_count,
        schedule: Schedule::DailyAt { hour: 2, minute: 0 },
        schedule_enabled: true,
        offset: utc_offset(0).expect("utc offset"),
    }
}

fn brand_dump() -> TableDump {
    TableDump {
        name: "brand".to_owned(),
        create_statement: "CREATE TABLE `brand` (`id` int NOT NULL, `name` varchar(64))".to_owned(),
        columns: vec!["id".to_owned(), "name".to_owned()],
        rows: vec![
            vec![SqlValue::Int(1), SqlValue::Text("Anchor".to_owned())],
            vec![SqlValue::Int(2), SqlValue::Null],
        ],
    }
}

fn brand_source() -> MockDumpSource {
    let mut source = MockDumpSource::new();
    source.expect_database_name().return_const("pos".to_owned());
    source
        .expect_list_tables()
        .returning(|| Ok(vec!["brand".to_owned()]));
    source.expect_load_table().returning(|_| Ok(brand_dump()));
    source
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::new(base_time()))
}

fn service_over(
    source: MockDumpSource,
    store: Arc<dyn DumpStore>,
    clock: &Arc<MutableClock>,
    keep_count: usize,
) -> BackupService {
    BackupService::new(Arc::new(source), store, clock.clone(), policy(keep_count))
}

/// Seed `count` dumps, one minute apart, the last one at `newest`.
fn seed_dumps(store: &FixtureDumpStore, count: usize, newest: DateTime<Utc>) -> Vec<DumpFileName> {
    (0..count)
        .map(|index| {
            let age = i64::try_from(count - 1 - index).expect("small count");
            let modified = newest - Duration::minutes(age);
            let name = DumpFileName::for_timestamp(modified.timestamp_millis());
            store.insert(name.clone(), b"-- dump\n", modified);
            name
        })
        .collect()
}

#[rstest]
#[tokio::test]
async fn successive_dumps_get_distinct_listable_names(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    store.set_modified(base_time());
    let service = service_over(brand_source(), store.clone(), &clock, 7);

    let first = service.create_dump().await.expect("first dump");
    let second = service.create_dump().await.expect("second dump");

    assert_ne!(first.filename, second.filename);
    assert_eq!(second.timestamp, first.timestamp + 1);
    let listed: Vec<DumpFileName> = service
        .list_dumps()
        .await
        .into_iter()
        .map(|entry| entry.filename)
        .collect();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&first.filename) && listed.contains(&second.filename));
}

#[rstest]
#[tokio::test]
async fn create_dump_writes_rendered_script(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    let service = service_over(brand_source(), store.clone(), &clock, 7);

    let created = service.create_dump().await.expect("dump created");

    assert!(created.success);
    assert_eq!(created.timestamp, base_time().timestamp_millis());
    assert_eq!(created.date, "2024-06-01T12:00:00.000Z");
    assert!(created.size.ends_with(" MB"));
    let bytes = store.contents(&created.filename).expect("file stored");
    let script = String::from_utf8(bytes).expect("utf-8 script");
    assert!(script.contains("-- Database: pos"));
    assert!(script.contains("DROP TABLE IF EXISTS `brand`;"));
    assert!(script.contains("INSERT INTO `brand` (`id`, `name`) VALUES (2, NULL);"));
}

#[rstest]
#[tokio::test]
async fn create_dump_leaves_nothing_behind_when_the_source_fails(clock: Arc<MutableClock>) {
    let mut source = MockDumpSource::new();
    source.expect_database_name().return_const("pos".to_owned());
    source
        .expect_list_tables()
        .returning(|| Ok(vec!["brand".to_owned(), "stock".to_owned()]));
    source.expect_load_table().returning(|table| {
        if table == "stock" {
            Err(DumpSourceError::connection("server has gone away"))
        } else {
            Ok(brand_dump())
        }
    });
    let store = Arc::new(FixtureDumpStore::default());
    let service = service_over(source, store.clone(), &clock, 7);

    let err = service.create_dump().await.expect_err("dump must fail");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    assert!(err.message().starts_with("backup failed:"));
    assert!(service.list_dumps().await.is_empty());
}

#[rstest]
#[case(5, 3, 2)]
#[case(3, 3, 0)]
#[case(3, 10, 0)]
#[case(4, 0, 4)]
#[tokio::test]
async fn prune_keeps_newest(
    clock: Arc<MutableClock>,
    #[case] existing: usize,
    #[case] keep: usize,
    #[case] expected_deleted: usize,
) {
    let store = Arc::new(FixtureDumpStore::default());
    let names = seed_dumps(&store, existing, base_time());
    let service = service_over(MockDumpSource::new(), store.clone(), &clock, 7);

    let deleted = service.prune(keep).await.expect("prune succeeds");

    assert_eq!(deleted, expected_deleted);
    let remaining: Vec<DumpFileName> = service
        .list_dumps()
        .await
        .into_iter()
        .map(|entry| entry.filename)
        .collect();
    let mut newest_first = names;
    newest_first.reverse();
    newest_first.truncate(keep);
    assert_eq!(remaining, newest_first);
}

#[rstest]
#[tokio::test]
async fn prune_is_idempotent(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    seed_dumps(&store, 6, base_time());
    let service = service_over(MockDumpSource::new(), store.clone(), &clock, 7);

    assert_eq!(service.prune(2).await.expect("first prune"), 4);
    assert_eq!(service.prune(2).await.expect("second prune"), 0);
    assert_eq!(service.list_dumps().await.len(), 2);
}

#[rstest]
#[tokio::test]
async fn prune_surfaces_delete_failures(clock: Arc<MutableClock>) {
    let mut store = MockDumpStore::new();
    let name = DumpFileName::for_timestamp(1);
    let listed = name.clone();
    store.expect_list().returning(move || {
        Ok(vec![StoredDump {
            filename: listed.clone(),
            size_bytes: 10,
            modified: base_time(),
        }])
    });
    store
        .expect_remove()
        .returning(|_| Err(DumpStoreError::io("permission denied")));
    let service = service_over(MockDumpSource::new(), Arc::new(store), &clock, 7);

    let err = service.prune(0).await.expect_err("prune fails");

    assert_eq!(err.code(), ErrorCode::InternalError);
    assert!(err.is_public());
    assert_eq!(
        err.message(),
        format!("prune failed: could not delete {name}")
    );
    assert!(!err.message().contains("permission denied"));
}

#[rstest]
#[tokio::test]
async fn delete_failures_name_the_dump_but_not_the_cause(clock: Arc<MutableClock>) {
    let mut store = MockDumpStore::new();
    store
        .expect_remove()
        .returning(|_| Err(DumpStoreError::io("EACCES /var/lib/pos/backups")));
    let service = service_over(MockDumpSource::new(), Arc::new(store), &clock, 7);

    let err = service
        .delete_dump("backup_1.sql")
        .await
        .expect_err("delete fails");

    assert_eq!(err.code(), ErrorCode::InternalError);
    assert!(err.is_public());
    assert_eq!(
        err.message(),
        "delete failed: could not access backup backup_1.sql"
    );
}

#[rstest]
#[tokio::test]
async fn stats_for_empty_directory_match_contract(clock: Arc<MutableClock>) {
    let service = service_over(
        MockDumpSource::new(),
        Arc::new(FixtureDumpStore::default()),
        &clock,
        7,
    );

    assert_eq!(service.stats().await, BackupStats::empty());
    assert!(service.latest_dump().await.is_none());
}

#[rstest]
#[case(45, "Just now")]
#[case(90, "1 minutes ago")]
#[tokio::test]
async fn stats_describe_time_since_only_backup(
    clock: Arc<MutableClock>,
    #[case] elapsed_secs: i64,
    #[case] expected: &str,
) {
    let store = Arc::new(FixtureDumpStore::default());
    seed_dumps(&store, 1, base_time());
    clock.advance_seconds(elapsed_secs);
    let service = service_over(MockDumpSource::new(), store, &clock, 7);

    let stats = service.stats().await;

    assert_eq!(stats.last_backup, expected);
    assert_eq!(stats.count, 1);
    assert_eq!(stats.status, STATUS_PROTECTED);
    assert_eq!(stats.total_size, "0.00 MB");
}

#[rstest]
#[tokio::test]
async fn storage_failures_degrade_read_paths(clock: Arc<MutableClock>) {
    let mut store = MockDumpStore::new();
    store
        .expect_list()
        .returning(|| Err(DumpStoreError::io("disk unplugged")));
    let service = service_over(MockDumpSource::new(), Arc::new(store), &clock, 7);

    assert_eq!(service.stats().await, BackupStats::degraded());
    assert!(service.list_dumps().await.is_empty());
    assert!(service.latest_dump().await.is_none());
}

#[rstest]
#[tokio::test]
async fn latest_dump_is_the_newest(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    let names = seed_dumps(&store, 3, base_time());
    let service = service_over(MockDumpSource::new(), store, &clock, 7);

    let latest = service.latest_dump().await.expect("latest present");

    assert_eq!(Some(&latest.filename), names.last());
    assert_eq!(latest.created, base_time());
}

#[rstest]
#[case("../../etc/passwd.sql")]
#[case("backup_1.txt")]
#[case("")]
#[tokio::test]
async fn unsafe_names_are_rejected_before_any_io(
    clock: Arc<MutableClock>,
    #[case] raw: &str,
) {
    // A mock with no expectations panics on any storage call.
    let store: Arc<dyn DumpStore> = Arc::new(MockDumpStore::new());
    let service = service_over(MockDumpSource::new(), store, &clock, 7);

    let delete = service.delete_dump(raw).await.expect_err("delete rejected");
    let download = service
        .download_path(raw)
        .await
        .expect_err("download rejected");

    assert_eq!(delete.code(), ErrorCode::InvalidRequest);
    assert_eq!(download.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn missing_dumps_are_not_found(clock: Arc<MutableClock>) {
    let service = service_over(
        MockDumpSource::new(),
        Arc::new(FixtureDumpStore::default()),
        &clock,
        7,
    );

    let delete = service
        .delete_dump("backup_1.sql")
        .await
        .expect_err("nothing to delete");
    let download = service
        .download_path("backup_1.sql")
        .await
        .expect_err("nothing to download");

    assert_eq!(delete.code(), ErrorCode::NotFound);
    assert_eq!(download.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn delete_and_download_existing_dump(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    let names = seed_dumps(&store, 1, base_time());
    let name = names.first().expect("seeded").clone();
    let service = service_over(MockDumpSource::new(), store.clone(), &clock, 7);

    let path = service
        .download_path(name.as_str())
        .await
        .expect("download path");
    assert!(path.ends_with(name.as_str()));

    let deleted = service.delete_dump(name.as_str()).await.expect("deleted");
    assert_eq!(deleted, name);
    assert!(store.contents(&name).is_none());
}

#[rstest]
#[tokio::test]
async fn backup_pass_creates_then_prunes(clock: Arc<MutableClock>) {
    let store = Arc::new(FixtureDumpStore::default());
    seed_dumps(&store, 3, base_time() - Duration::days(1));
    store.set_modified(base_time());
    let service = service_over(brand_source(), store.clone(), &clock, 2);

    let outcome = service.run_backup_pass().await.expect("pass succeeds");

    assert_eq!(outcome.pruned, 2);
    let listed = service.list_dumps().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(
        listed.first().map(|entry| &entry.filename),
        Some(&outcome.created.filename)
    );
    assert!(!service.pass_running());
}

#[rstest]
fn schedule_status_reports_next_run(clock: Arc<MutableClock>) {
    clock.set(Utc.with_ymd_and_hms(2024, 6, 1, 1, 30, 0).single().expect("valid"));
    let service = service_over(
        MockDumpSource::new(),
        Arc::new(FixtureDumpStore::default()),
        &clock,
        7,
    );

    let status = service.schedule_status();

    assert!(status.enabled);
    assert_eq!(status.schedule, "Daily at 02:00");
    assert_eq!(status.timezone, "UTC");
    let next_run = status.next_run.expect("next run present");
    assert_eq!(next_run.to_rfc3339(), "2024-06-01T02:00:00+00:00");
}

#[rstest]
fn disabled_schedule_has_no_next_run(clock: Arc<MutableClock>) {
    let mut disabled = policy(7);
    disabled.schedule_enabled = false;
    let service = BackupService::new(
        Arc::new(MockDumpSource::new()),
        Arc::new(FixtureDumpStore::default()),
        clock,
        disabled,
    );

    let status = service.schedule_status();

    assert!(!status.enabled);
    assert!(status.next_run.is_none());
}
