//! In-memory result repository.
//!
//! Rows live in a map keyed by [`ResultKey`] behind a read/write lock. A unit
//! of work holds the writer mutex for its whole lifetime and stages writes
//! privately; commit publishes them in one step, so readers only ever see
//! pre- or post-batch state. When bound to a [`SnapshotFile`], commit
//! persists the new state before publishing it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use markr_core::error::RepositoryError;
use markr_core::model::{CanonicalResult, ResultKey, StoredResult};
use markr_core::traits::{ResultRepository, UnitOfWork};

use crate::snapshot::SnapshotFile;

type Rows = HashMap<ResultKey, StoredResult>;

/// A result repository held in process memory, optionally snapshotted to disk.
pub struct MemoryRepository {
    rows: Arc<RwLock<Rows>>,
    writer: Arc<Mutex<()>>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryRepository {
    /// An empty, purely in-memory repository.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            writer: Arc::new(Mutex::new(())),
            snapshot: None,
        }
    }

    /// Open a repository backed by a JSON snapshot at `path`.
    ///
    /// A missing file starts an empty store; the file is created on the
    /// first commit.
    pub fn open_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = SnapshotFile::new(path.as_ref());
        let rows: Rows = snapshot
            .load()?
            .into_iter()
            .map(|row| (row.key(), row))
            .collect();
        tracing::info!(
            path = %snapshot.path().display(),
            rows = rows.len(),
            "opened result snapshot"
        );
        Ok(Self {
            rows: Arc::new(RwLock::new(rows)),
            writer: Arc::new(Mutex::new(())),
            snapshot: Some(snapshot),
        })
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored result for `key`, if any.
    pub fn get(&self, key: &ResultKey) -> Option<StoredResult> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultRepository for MemoryRepository {
    fn name(&self) -> &str {
        if self.snapshot.is_some() {
            "json"
        } else {
            "memory"
        }
    }

    async fn find_all_by_test_id(
        &self,
        test_id: &str,
    ) -> Result<Vec<StoredResult>, RepositoryError> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows
            .values()
            .filter(|row| row.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            _writer: guard,
            rows: Arc::clone(&self.rows),
            snapshot: self.snapshot.clone(),
            staged: HashMap::new(),
        }))
    }
}

/// Staged writes for one transaction against a [`MemoryRepository`].
struct MemoryUnitOfWork {
    _writer: OwnedMutexGuard<()>,
    rows: Arc<RwLock<Rows>>,
    snapshot: Option<SnapshotFile>,
    staged: Rows,
}

impl MemoryUnitOfWork {
    fn current(&self, key: &ResultKey) -> Option<StoredResult> {
        if let Some(row) = self.staged.get(key) {
            return Some(row.clone());
        }
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_existing_by_keys(
        &mut self,
        keys: &[ResultKey],
    ) -> Result<Vec<StoredResult>, RepositoryError> {
        Ok(keys.iter().filter_map(|key| self.current(key)).collect())
    }

    async fn create_result(
        &mut self,
        record: &CanonicalResult,
    ) -> Result<StoredResult, RepositoryError> {
        let key = record.key();
        if self.current(&key).is_some() {
            return Err(RepositoryError::Conflict(key.to_string()));
        }
        let row = StoredResult::from_canonical(record, Utc::now());
        self.staged.insert(key, row.clone());
        Ok(row)
    }

    async fn update_result(
        &mut self,
        existing: &StoredResult,
        record: &CanonicalResult,
    ) -> Result<StoredResult, RepositoryError> {
        let key = existing.key();
        let mut row = self
            .current(&key)
            .ok_or_else(|| RepositoryError::MissingRow(key.to_string()))?;
        row.apply(record, Utc::now());
        self.staged.insert(key, row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let MemoryUnitOfWork {
            _writer,
            rows,
            snapshot,
            staged,
        } = *self;
        if staged.is_empty() {
            return Ok(());
        }
        let staged_count = staged.len();

        match snapshot {
            None => {
                rows.write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(staged);
            }
            Some(snapshot) => {
                let mut next = rows.read().unwrap_or_else(PoisonError::into_inner).clone();
                next.extend(staged);
                // File I/O and fsync run on the blocking pool; the writer
                // mutex stays held until the new state is published.
                let (next, saved) = tokio::task::spawn_blocking(move || {
                    let saved = snapshot.save(next.values());
                    (next, saved)
                })
                .await
                .map_err(|e| {
                    RepositoryError::TransactionAborted(format!("snapshot writer failed: {e}"))
                })?;
                saved.map_err(|e| RepositoryError::TransactionAborted(format!("{e:#}")))?;
                *rows.write().unwrap_or_else(PoisonError::into_inner) = next;
            }
        }

        tracing::debug!(rows = staged_count, "committed unit of work");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        tracing::debug!(discarded = self.staged.len(), "rolled back unit of work");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(sn: &str, test: &str, obtained: u32, available: u32) -> CanonicalResult {
        CanonicalResult {
            first_name: "F".into(),
            last_name: "L".into(),
            student_number: sn.into(),
            test_id: test.into(),
            scanned_on: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            marks_available: available,
            marks_obtained: obtained,
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let repo = MemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();

        assert!(repo.find_all_by_test_id("T").await.unwrap().is_empty());
        uow.commit().await.unwrap();
        assert_eq!(repo.find_all_by_test_id("T").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let repo = MemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        uow.rollback().await.unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn dropping_uncommitted_work_discards_writes() {
        let repo = MemoryRepository::new();
        {
            let mut uow = repo.begin().await.unwrap();
            uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        }
        assert!(repo.is_empty());
        // The writer lock was released with the dropped unit of work.
        let uow = repo.begin().await.unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn create_conflicts_with_existing_row() {
        let repo = MemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        let err = uow.create_result(&rec("1", "T", 6, 10)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let repo = MemoryRepository::new();
        let ghost = StoredResult::from_canonical(&rec("1", "T", 5, 10), Utc::now());
        let mut uow = repo.begin().await.unwrap();
        let err = uow
            .update_result(&ghost, &rec("1", "T", 6, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingRow(_)));
    }

    #[tokio::test]
    async fn update_keeps_created_at() {
        let repo = MemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        let created = uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let existing = uow
            .find_existing_by_keys(&[ResultKey::new("1", "T")])
            .await
            .unwrap();
        assert_eq!(existing.len(), 1);
        let updated = uow
            .update_result(&existing[0], &rec("1", "T", 9, 10))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(
            repo.get(&ResultKey::new("1", "T")).unwrap().marks_obtained,
            9
        );
    }

    #[tokio::test]
    async fn find_existing_returns_only_requested_keys() {
        let repo = MemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        for sn in ["1", "2", "3"] {
            uow.create_result(&rec(sn, "T", 5, 10)).await.unwrap();
        }
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let found = uow
            .find_existing_by_keys(&[ResultKey::new("2", "T"), ResultKey::new("2", "U")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].student_number, "2");
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let repo = MemoryRepository::open_snapshot(&path).unwrap();
        assert_eq!(repo.name(), "json");
        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        uow.commit().await.unwrap();
        drop(repo);

        let reopened = MemoryRepository::open_snapshot(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(
            reopened.get(&ResultKey::new("1", "T")).unwrap().marks_obtained,
            5
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshot_commit_on_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let repo = MemoryRepository::open_snapshot(&path).unwrap();

        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        let (committed, seen) = tokio::join!(uow.commit(), repo.find_all_by_test_id("T"));
        committed.unwrap();

        assert!(seen.unwrap().len() <= 1);
        assert_eq!(repo.len(), 1);
        assert_eq!(SnapshotFile::new(&path).load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_snapshot_write_aborts_commit() {
        let dir = tempfile::tempdir().unwrap();
        // The snapshot's parent is a regular file, so the save cannot succeed.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let repo = MemoryRepository::open_snapshot(blocker.join("results.json")).unwrap();

        let mut uow = repo.begin().await.unwrap();
        uow.create_result(&rec("1", "T", 5, 10)).await.unwrap();
        let err = uow.commit().await.unwrap_err();

        assert!(matches!(err, RepositoryError::TransactionAborted(_)));
        assert!(repo.is_empty());
    }
}
