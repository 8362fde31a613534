//! Retention sweep scenarios against an in-memory store and a temp dir.

use hostbin::config::AppConfig;
use hostbin::models::record::{Payload, Record};
use hostbin::services::cdn_service::CdnService;
use hostbin::services::record_store::{MemoryRecordStore, RecordStore};
use hostbin::services::sweeper::{SweepStats, Sweeper};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DAY_MS: i64 = 86_400_000;

fn test_config(storage_dir: &Path, cap_kib: Option<u64>) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        storage_dir: storage_dir.display().to_string(),
        database_url: "sqlite::memory:".into(),
        public_url: "http://localhost".into(),
        admin_secret: Some("hunter2".into()),
        key_length: 8,
        filesize_limit_kib: cap_kib,
        admin_filesize_limit_kib: None,
        retention_enabled: true,
        retention_min_age_days: 7.0,
        retention_max_age_days: 30.0,
        sweep_interval_secs: 3600,
        blocked_extensions: vec![],
        blocked_content_types: vec![],
    }
}

fn days_ago(days: i64) -> i64 {
    CdnService::now_ms() - days * DAY_MS
}

fn file_record(path: &Path, created_at: i64) -> Record {
    Record {
        payload: Payload::File {
            path: path.to_path_buf(),
            mime_type: "application/octet-stream".into(),
        },
        privileged: false,
        created_at,
        expires_at: None,
    }
}

async fn write_payload(dir: &TempDir, name: &str, size: usize) -> std::path::PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, vec![0u8; size]).await.unwrap();
    path
}

fn sweeper(store: &Arc<MemoryRecordStore>, config: AppConfig) -> Sweeper {
    Sweeper::new(store.clone(), Arc::new(config))
}

#[tokio::test]
async fn expired_file_loses_record_and_payload() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    // 90% of a 100 KiB cap, 40 days old: allowance is negative, so expired.
    let path = write_payload(&dir, "old.bin", 92_160).await;
    store
        .set("old", &file_record(&path, days_ago(40)))
        .await
        .unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(store.get("old").await.unwrap(), None);
    assert!(!path.exists());
}

#[tokio::test]
async fn young_small_file_survives() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let path = write_payload(&dir, "small.bin", 1024).await;
    store
        .set("small", &file_record(&path, days_ago(1)))
        .await
        .unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.expired, 0);
    assert!(store.get("small").await.unwrap().is_some());
    assert!(path.exists());
}

#[tokio::test]
async fn short_links_are_exempt_regardless_of_age() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    store
        .set(
            "ancient",
            &Record::short_link("https://example.com/", days_ago(3650)),
        )
        .await
        .unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.expired, 0);
    assert!(store.get("ancient").await.unwrap().is_some());
}

#[tokio::test]
async fn disabled_retention_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let path = write_payload(&dir, "old.bin", 92_160).await;
    store
        .set("old", &file_record(&path, days_ago(400)))
        .await
        .unwrap();

    let mut config = test_config(dir.path(), Some(100));
    config.retention_enabled = false;
    let stats = sweeper(&store, config).sweep().await;

    assert_eq!(stats, SweepStats::default());
    assert!(store.get("old").await.unwrap().is_some());
    assert!(path.exists());
}

#[tokio::test]
async fn no_size_cap_means_no_implicit_expiry() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let path = write_payload(&dir, "kept.bin", 92_160).await;
    store
        .set("kept", &file_record(&path, days_ago(400)))
        .await
        .unwrap();

    let stats = sweeper(&store, test_config(dir.path(), None)).sweep().await;

    assert_eq!(stats.expired, 0);
    assert!(store.get("kept").await.unwrap().is_some());
}

#[tokio::test]
async fn explicit_deadline_overrides_the_curve() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    // Young small file with a past deadline: expires despite the curve.
    let doomed_path = write_payload(&dir, "doomed.txt", 16).await;
    let mut doomed = file_record(&doomed_path, days_ago(1));
    doomed.expires_at = Some(days_ago(0) - 1);
    store.set("doomed", &doomed).await.unwrap();

    // Curve-expired file with a future deadline: the deadline wins.
    let spared_path = write_payload(&dir, "spared.bin", 92_160).await;
    let mut spared = file_record(&spared_path, days_ago(40));
    spared.expires_at = Some(days_ago(0) + 30 * DAY_MS);
    store.set("spared", &spared).await.unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.expired, 1);
    assert_eq!(store.get("doomed").await.unwrap(), None);
    assert!(!doomed_path.exists());
    assert!(store.get("spared").await.unwrap().is_some());
    assert!(spared_path.exists());
}

#[tokio::test]
async fn missing_backing_file_heals_the_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let phantom = dir.path().join("vanished.bin");
    store
        .set("stale", &file_record(&phantom, days_ago(1)))
        .await
        .unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.healed, 1);
    assert_eq!(stats.expired, 0);
    assert_eq!(store.get("stale").await.unwrap(), None);
}

#[tokio::test]
async fn privileged_records_use_the_admin_cap() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    // Same size and age for both; only the privilege flag differs. With no
    // admin cap configured, the privileged record never expires implicitly.
    let anon_path = write_payload(&dir, "anon.bin", 92_160).await;
    store
        .set("anon", &file_record(&anon_path, days_ago(40)))
        .await
        .unwrap();

    let admin_path = write_payload(&dir, "admin.bin", 92_160).await;
    let mut admin = file_record(&admin_path, days_ago(40));
    admin.privileged = true;
    store.set("admin", &admin).await.unwrap();

    let stats = sweeper(&store, test_config(dir.path(), Some(100))).sweep().await;

    assert_eq!(stats.expired, 1);
    assert_eq!(store.get("anon").await.unwrap(), None);
    assert!(store.get("admin").await.unwrap().is_some());
    assert!(admin_path.exists());
}

#[tokio::test]
async fn sweep_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let path = write_payload(&dir, "old.bin", 92_160).await;
    store
        .set("old", &file_record(&path, days_ago(40)))
        .await
        .unwrap();

    let sweeper = sweeper(&store, test_config(dir.path(), Some(100)));
    let first = sweeper.sweep().await;
    let second = sweeper.sweep().await;

    assert_eq!(first.expired, 1);
    assert_eq!(second, SweepStats::default());
}
