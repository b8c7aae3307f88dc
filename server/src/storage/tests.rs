use super::backend::ObjectStoreBackend;
use super::config::StorageConfig;
use super::error::StorageError;
use super::traits::DocumentStore;
use chrono::{TimeZone, Utc};
use serde_json::json;
use shared_types::{ConfigurationRecord, HistoryEntry};
use tempfile::TempDir;

fn create_test_backend() -> (ObjectStoreBackend, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::Local {
        path: temp_dir.path().to_path_buf(),
    };
    let backend = ObjectStoreBackend::from_config(config).unwrap();
    (backend, temp_dir)
}

fn record(name: &str, content: serde_json::Value, version: u64) -> ConfigurationRecord {
    let mut record = ConfigurationRecord::new(name);
    record.content = content;
    record.version = version;
    record
}

fn entry(snapshot: &ConfigurationRecord) -> HistoryEntry {
    HistoryEntry {
        version: snapshot.version,
        archived_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        snapshot: snapshot.clone(),
    }
}

#[tokio::test]
async fn test_set_and_get() {
    let (backend, _dir) = create_test_backend();

    let banner = record("banner", json!({"text": "hello"}), 1);
    backend.set(&banner).await.unwrap();

    let retrieved = backend.get("banner").await.unwrap().unwrap();
    assert_eq!(retrieved, banner);
}

#[tokio::test]
async fn test_get_missing() {
    let (backend, _dir) = create_test_backend();

    assert!(backend.get("missing").await.unwrap().is_none());
    assert!(!backend.exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_unknown_fields_survive_storage() {
    let (backend, _dir) = create_test_backend();

    let mut flagged = record("flag", json!(true), 1);
    flagged
        .extra
        .insert("owner".to_string(), json!("growth-team"));
    backend.set(&flagged).await.unwrap();

    let retrieved = backend.get("flag").await.unwrap().unwrap();
    assert_eq!(retrieved.extra["owner"], "growth-team");
}

#[tokio::test]
async fn test_get_all_skips_history() {
    let (backend, _dir) = create_test_backend();

    let first = record("first", json!("a"), 2);
    let second = record("second", json!("b"), 1);
    backend.set(&first).await.unwrap();
    backend.set(&second).await.unwrap();
    backend
        .append_history("first", &entry(&record("first", json!("old"), 1)))
        .await
        .unwrap();

    let mut all = backend.get_all().await.unwrap();
    all.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(all, vec![first, second]);
}

#[tokio::test]
async fn test_delete() {
    let (backend, _dir) = create_test_backend();

    backend.set(&record("banner", json!("a"), 1)).await.unwrap();
    assert!(backend.exists("banner").await.unwrap());

    backend.delete("banner").await.unwrap();
    assert!(!backend.exists("banner").await.unwrap());
    assert!(backend.get_all().await.unwrap().is_empty());

    // Deleting again is a no-op
    backend.delete("banner").await.unwrap();
}

#[tokio::test]
async fn test_history_survives_delete() {
    let (backend, _dir) = create_test_backend();

    let v1 = record("banner", json!("a"), 1);
    backend.set(&v1).await.unwrap();
    backend.append_history("banner", &entry(&v1)).await.unwrap();
    backend.delete("banner").await.unwrap();

    let history = backend.list_history("banner").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].snapshot, v1);
}

#[tokio::test]
async fn test_history_is_ordered_by_version() {
    let (backend, _dir) = create_test_backend();

    // v10 sorts before v2 as a key, not as a version
    for version in [10, 2, 1] {
        let snapshot = record("banner", json!(version), version);
        backend.append_history("banner", &entry(&snapshot)).await.unwrap();
    }

    let versions: Vec<u64> = backend
        .list_history("banner")
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 10]);

    let second = backend.get_history("banner", 2).await.unwrap().unwrap();
    assert_eq!(second.snapshot.content, json!(2));
    assert!(backend.get_history("banner", 3).await.unwrap().is_none());
}

#[tokio::test]
async fn test_history_never_overwrites_an_entry() {
    let (backend, _dir) = create_test_backend();

    let first = record("banner", json!("a"), 1);
    let mut again = entry(&record("banner", json!("x"), 1));
    again.archived_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

    backend.append_history("banner", &entry(&first)).await.unwrap();
    backend.append_history("banner", &again).await.unwrap();
    backend.append_history("banner", &again).await.unwrap();

    let contents: Vec<serde_json::Value> = backend
        .list_history("banner")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.snapshot.content)
        .collect();
    assert_eq!(contents, vec![json!("a"), json!("x"), json!("x")]);

    // The plain version key still holds the first snapshot
    let v1 = backend.get_history("banner", 1).await.unwrap().unwrap();
    assert_eq!(v1.snapshot, first);
}

#[tokio::test]
async fn test_history_of_unknown_name_is_empty() {
    let (backend, _dir) = create_test_backend();

    assert!(backend.list_history("never-written").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    let (backend, _dir) = create_test_backend();
    let too_long = "x".repeat(1501);

    for name in ["", ".", "..", "a/b", too_long.as_str()] {
        let err = backend.get(name).await.unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<StorageError>(),
                Some(StorageError::InvalidName { .. })
            ),
            "expected invalid name error for {name:?}, got {err:?}"
        );
        assert!(backend.set(&record(name, json!(1), 1)).await.is_err());
    }

    assert!(backend.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_local_names_fit_in_one_path_component() {
    let (backend, _dir) = create_test_backend();
    let long = "x".repeat(300);

    let err = backend.set(&record(&long, json!(1), 1)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StorageError>(),
        Some(StorageError::InvalidName { .. })
    ));

    let longest = "x".repeat(255);
    backend.set(&record(&longest, json!(1), 1)).await.unwrap();
    assert!(backend.exists(&longest).await.unwrap());

    // Other stores keep the larger ceiling
    let memory = ObjectStoreBackend::in_memory();
    memory.set(&record(&long, json!(1), 1)).await.unwrap();
    assert!(memory.exists(&long).await.unwrap());
}

#[tokio::test]
async fn test_in_memory_backend() {
    let backend = ObjectStoreBackend::in_memory();

    backend.set(&record("banner", json!("a"), 1)).await.unwrap();
    assert_eq!(backend.get_all().await.unwrap().len(), 1);
}
