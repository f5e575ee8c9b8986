//! Snapshot-backed store behaviour across process restarts.

use std::sync::Arc;

use markr_core::ResultsEngine;
use markr_store::{create_repository, MemoryRepository, StoreBackend, StoreConfig};

const BATCH: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<mcq-test-results>
    <mcq-test-result scanned-on="2017-12-04T12:12:10+11:00">
        <first-name>KJ</first-name>
        <last-name>Alysander</last-name>
        <student-number>002299</student-number>
        <test-id>9863</test-id>
        <summary-marks available="20" obtained="13" />
    </mcq-test-result>
    <mcq-test-result scanned-on="2017-12-04T12:13:10+11:00">
        <first-name>Ada</first-name>
        <last-name>Lovelace</last-name>
        <student-number>002300</student-number>
        <test-id>9863</test-id>
        <summary-marks available="20" obtained="17" />
    </mcq-test-result>
</mcq-test-results>"#;

#[tokio::test]
async fn results_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        backend: StoreBackend::Json,
        path: dir.path().join("data").join("results.json"),
    };

    {
        let engine = ResultsEngine::new(create_repository(&config).unwrap());
        assert_eq!(engine.ingest(BATCH).await.unwrap(), 2);
    }
    assert!(config.path.exists());

    let engine = ResultsEngine::new(create_repository(&config).unwrap());
    let stats = engine.aggregate("9863").await.unwrap().unwrap();
    assert_eq!(stats.count, 2);
    assert_eq!(stats.mean, 75.0);

    // Same batch again: nothing to write.
    assert_eq!(engine.ingest(BATCH).await.unwrap(), 0);
}

#[tokio::test]
async fn rejected_batch_does_not_touch_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let repo = Arc::new(MemoryRepository::open_snapshot(&path).unwrap());
    let engine = ResultsEngine::new(repo.clone());

    engine.ingest(BATCH).await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let bad = BATCH.replace("obtained=\"17\"", "obtained=\"lots\"");
    assert!(engine.ingest(&bad).await.is_err());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(repo.len(), 2);
}

#[tokio::test]
async fn corrupt_snapshot_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(&path, "{ \"version\": 1, ").unwrap();

    let config = StoreConfig {
        backend: StoreBackend::Json,
        path,
    };
    let err = create_repository(&config).err().unwrap();
    assert!(format!("{err:#}").contains("failed to open result store"));
}
