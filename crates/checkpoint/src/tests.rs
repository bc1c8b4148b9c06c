//! Unit tests for the checkpoint crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::{
    Checkpoint, CheckpointFile, CheckpointID, CheckpointManager, CheckpointStore, FilesystemStore,
    MemoryStore,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct TestCheckpoint {
    value: i64,
    timestamp: DateTime<Utc>,
}

impl Checkpoint for TestCheckpoint {
    const SOURCE_TYPE: &'static str = "test";

    fn to_cli_string(&self) -> String {
        format!("{}:{}", self.value, self.timestamp.to_rfc3339())
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = s.splitn(2, ':').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid test checkpoint format: expected 'value:timestamp'");
        }
        Ok(Self {
            value: parts[0].parse()?,
            timestamp: DateTime::parse_from_rfc3339(parts[1])?.with_timezone(&Utc),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct OtherCheckpoint {
    lsn: u64,
}

impl Checkpoint for OtherCheckpoint {
    const SOURCE_TYPE: &'static str = "other";

    fn to_cli_string(&self) -> String {
        self.lsn.to_string()
    }

    fn from_cli_string(s: &str) -> anyhow::Result<Self> {
        Ok(Self { lsn: s.parse()? })
    }
}

fn checkpoint(value: i64) -> TestCheckpoint {
    TestCheckpoint {
        value,
        timestamp: Utc::now(),
    }
}

// ============================================================================
// CheckpointFile Tests
// ============================================================================

#[test]
fn test_checkpoint_file_roundtrip() {
    let original = checkpoint(12345);
    let file = CheckpointFile::new(&original, "slot-a").unwrap();
    assert_eq!(file.source_type, "test");
    assert_eq!(file.session, "slot-a");

    let json = serde_json::to_string_pretty(&file).unwrap();
    let loaded: CheckpointFile = serde_json::from_str(&json).unwrap();
    let parsed: TestCheckpoint = loaded.parse().unwrap();

    assert_eq!(parsed, original);
}

#[test]
fn test_checkpoint_file_type_mismatch() {
    let file = CheckpointFile::new(&checkpoint(1), "slot-a").unwrap();
    let err = file.parse::<OtherCheckpoint>().unwrap_err();
    assert!(err.to_string().contains("type mismatch"));
}

#[test]
fn test_cli_string_roundtrip() {
    let original = checkpoint(-7);
    let parsed = TestCheckpoint::from_cli_string(&original.to_cli_string()).unwrap();
    assert_eq!(parsed.value, -7);
    assert_eq!(parsed.timestamp.timestamp(), original.timestamp.timestamp());
    assert!(TestCheckpoint::from_cli_string("garbage").is_err());
}

// ============================================================================
// Store Tests
// ============================================================================

#[tokio::test]
async fn test_filesystem_store_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path());
    let id = CheckpointID::new("test", "slot-a.1");

    assert!(store.read_checkpoint(&id).await.unwrap().is_none());

    store
        .store_checkpoint(&id, &CheckpointFile::new(&checkpoint(1), "slot-a.1").unwrap())
        .await
        .unwrap();
    store
        .store_checkpoint(&id, &CheckpointFile::new(&checkpoint(2), "slot-a.1").unwrap())
        .await
        .unwrap();

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert!(store
        .path_for(&id)
        .unwrap()
        .ends_with("checkpoint_test_slot-a.1.json"));

    let stored = store.read_checkpoint(&id).await.unwrap().unwrap();
    assert_eq!(stored.parse::<TestCheckpoint>().unwrap().value, 2);

    store.clear_checkpoint(&id).await.unwrap();
    assert!(store.read_checkpoint(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_filesystem_store_keeps_similar_sessions_apart() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path());
    let dotted = CheckpointID::new("test", "a.b");
    let underscored = CheckpointID::new("test", "a_b");

    store
        .store_checkpoint(&dotted, &CheckpointFile::new(&checkpoint(1), "a.b").unwrap())
        .await
        .unwrap();
    store
        .store_checkpoint(&underscored, &CheckpointFile::new(&checkpoint(2), "a_b").unwrap())
        .await
        .unwrap();

    let read = |file: Option<CheckpointFile>| file.unwrap().parse::<TestCheckpoint>().unwrap().value;
    assert_eq!(read(store.read_checkpoint(&dotted).await.unwrap()), 1);
    assert_eq!(read(store.read_checkpoint(&underscored).await.unwrap()), 2);
}

#[tokio::test]
async fn test_filesystem_store_rejects_invalid_sessions() {
    let dir = TempDir::new().unwrap();
    let store = FilesystemStore::new(dir.path());

    for session in ["slot/a", "", "..", "../escape", "slot a", "ünïcode"] {
        let id = CheckpointID::new("test", session);
        assert!(store.path_for(&id).is_err(), "{session:?} accepted");
        assert!(store.read_checkpoint(&id).await.is_err());
        assert!(store
            .store_checkpoint(&id, &CheckpointFile::new(&checkpoint(1), session).unwrap())
            .await
            .is_err());
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_memory_store_isolates_sessions() {
    let store = MemoryStore::new();
    let a = CheckpointID::new("test", "a");
    let b = CheckpointID::new("test", "b");

    store
        .store_checkpoint(&a, &CheckpointFile::new(&checkpoint(1), "a").unwrap())
        .await
        .unwrap();

    assert!(store.read_checkpoint(&a).await.unwrap().is_some());
    assert!(store.read_checkpoint(&b).await.unwrap().is_none());
}

// ============================================================================
// CheckpointManager Tests
// ============================================================================

#[tokio::test]
async fn test_manager_save_and_load() {
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::new(Arc::new(FilesystemStore::new(dir.path())), "orders");

    let empty: Option<TestCheckpoint> = manager.load().await.unwrap();
    assert!(empty.is_none());

    let original = checkpoint(99);
    manager.save(&original).await.unwrap();

    // A fresh manager over the same directory resumes the same position.
    let reopened = CheckpointManager::new(Arc::new(FilesystemStore::new(dir.path())), "orders");
    let loaded: TestCheckpoint = reopened.load().await.unwrap().unwrap();
    assert_eq!(loaded, original);

    reopened.clear::<TestCheckpoint>().await.unwrap();
    let cleared: Option<TestCheckpoint> = reopened.load().await.unwrap();
    assert!(cleared.is_none());
}

#[tokio::test]
async fn test_manager_keys_by_source_type() {
    let manager = CheckpointManager::new(Arc::new(MemoryStore::new()), "orders");
    manager.save(&checkpoint(5)).await.unwrap();

    let other: Option<OtherCheckpoint> = manager.load().await.unwrap();
    assert!(other.is_none());
    assert_eq!(manager.session(), "orders");
}
