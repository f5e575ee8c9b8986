//! Core data model types for markr.
//!
//! A [`CanonicalResult`] is one decoded, validated scan from an import batch.
//! A [`StoredResult`] is the durable row for one (student, test) identity as
//! handed back by a repository.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identity of a result: at most one stored row exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultKey {
    pub student_number: String,
    pub test_id: String,
}

impl ResultKey {
    pub fn new(student_number: impl Into<String>, test_id: impl Into<String>) -> Self {
        Self {
            student_number: student_number.into(),
            test_id: test_id.into(),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "student {} / test {}", self.student_number, self.test_id)
    }
}

/// A validated result decoded from one `mcq-test-result` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalResult {
    pub first_name: String,
    pub last_name: String,
    pub student_number: String,
    pub test_id: String,
    /// When the answer sheet was scanned.
    pub scanned_on: DateTime<Utc>,
    pub marks_available: u32,
    /// Not checked against `marks_available`.
    pub marks_obtained: u32,
}

impl CanonicalResult {
    pub fn key(&self) -> ResultKey {
        ResultKey::new(self.student_number.clone(), self.test_id.clone())
    }

    /// `(obtained, available)`, compared lexicographically when picking the
    /// best of several scans.
    pub fn score(&self) -> (u32, u32) {
        (self.marks_obtained, self.marks_available)
    }
}

/// A durable result row owned by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    pub first_name: String,
    pub last_name: String,
    pub student_number: String,
    pub test_id: String,
    pub scanned_on: DateTime<Utc>,
    pub marks_available: u32,
    pub marks_obtained: u32,
    /// Set by the repository when the row is first written.
    pub created_at: DateTime<Utc>,
    /// Set by the repository on every write.
    pub updated_at: DateTime<Utc>,
}

impl StoredResult {
    /// Build a fresh row from a canonical record, stamped with `now`.
    pub fn from_canonical(record: &CanonicalResult, now: DateTime<Utc>) -> Self {
        Self {
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            student_number: record.student_number.clone(),
            test_id: record.test_id.clone(),
            scanned_on: record.scanned_on,
            marks_available: record.marks_available,
            marks_obtained: record.marks_obtained,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every scanned attribute with `record`, keeping `created_at`.
    pub fn apply(&mut self, record: &CanonicalResult, now: DateTime<Utc>) {
        self.first_name = record.first_name.clone();
        self.last_name = record.last_name.clone();
        self.scanned_on = record.scanned_on;
        self.marks_available = record.marks_available;
        self.marks_obtained = record.marks_obtained;
        self.updated_at = now;
    }

    pub fn key(&self) -> ResultKey {
        ResultKey::new(self.student_number.clone(), self.test_id.clone())
    }

    /// Whether `record` beats this row in either dimension and may overwrite it.
    pub fn is_improved_by(&self, record: &CanonicalResult) -> bool {
        record.marks_obtained > self.marks_obtained
            || record.marks_available > self.marks_available
    }
}
