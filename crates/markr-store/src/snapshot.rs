//! JSON snapshot persistence for the in-memory repository.
//!
//! The whole result set is written on every commit: serialised to a
//! temporary file next to the snapshot, then renamed over it, so a crash
//! leaves either the old or the new snapshot on disk.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use markr_core::model::StoredResult;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    results: Vec<StoredResult>,
}

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every stored result. A missing file is an empty store.
    pub fn load(&self) -> Result<Vec<StoredResult>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no snapshot yet, starting empty");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot from {}", self.path.display()))?;
        let doc: SnapshotDocument = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot {}", self.path.display()))?;

        if doc.version != SNAPSHOT_VERSION {
            anyhow::bail!(
                "unsupported snapshot version {} in {} (expected {SNAPSHOT_VERSION})",
                doc.version,
                self.path.display()
            );
        }

        let mut seen = HashSet::new();
        for row in &doc.results {
            if !seen.insert(row.key()) {
                anyhow::bail!(
                    "snapshot {} holds more than one result for {}",
                    self.path.display(),
                    row.key()
                );
            }
        }

        tracing::debug!(path = %self.path.display(), rows = doc.results.len(), "loaded snapshot");
        Ok(doc.results)
    }

    /// Atomically replace the snapshot with `rows`.
    pub fn save<'a>(&self, rows: impl IntoIterator<Item = &'a StoredResult>) -> Result<()> {
        let mut results: Vec<StoredResult> = rows.into_iter().cloned().collect();
        results.sort_by(|a, b| {
            (&a.test_id, &a.student_number).cmp(&(&b.test_id, &b.student_number))
        });

        let doc = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            results,
        };
        let json = serde_json::to_string_pretty(&doc).context("failed to serialize snapshot")?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        tmp.write_all(json.as_bytes())
            .context("failed to write snapshot")?;
        tmp.as_file().sync_all().context("failed to sync snapshot")?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to replace snapshot {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), rows = doc.results.len(), "saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use markr_core::model::CanonicalResult;

    fn row(sn: &str, test: &str, obtained: u32) -> StoredResult {
        let record = CanonicalResult {
            first_name: "F".into(),
            last_name: "L".into(),
            student_number: sn.into(),
            test_id: test.into(),
            scanned_on: Utc.with_ymd_and_hms(2017, 12, 4, 1, 12, 10).unwrap(),
            marks_available: 20,
            marks_obtained: obtained,
        };
        StoredResult::from_canonical(&record, Utc::now())
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("results.json"));
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("nested").join("results.json"));
        let rows = vec![row("2", "T", 5), row("1", "T", 7)];
        snapshot.save(&rows).unwrap();

        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].student_number, "1");
        assert_eq!(loaded[1].marks_obtained, 5);
    }

    #[test]
    fn rejects_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let doc = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            results: vec![row("1", "T", 5), row("1", "T", 6)],
        };
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("more than one result"));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(SnapshotFile::new(&path).load().is_err());
    }
}
