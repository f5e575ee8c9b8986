//! Ingestion and repository error types.
//!
//! Every ingestion failure is surfaced as an [`IngestFailure`], whose message
//! carries a stable prefix in front of the inner [`IngestError`] message. A
//! transport layer can match on [`IngestFailure::kind`] or on the text.

use thiserror::Error;

/// Prefix shared by every ingestion failure message.
pub const INGEST_FAILURE_PREFIX: &str = "Failed to import and ingest test results";

/// Prefix shared by every aggregation failure message.
pub const AGGREGATE_FAILURE_PREFIX: &str = "Failed to aggregate test results";

/// Placeholder used in messages when an identity field is itself missing.
pub const NOT_AVAILABLE: &str = "N/A";

/// Errors reported by a result repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The backing store could not be reached or failed an operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The unit of work could not be committed and was rolled back.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// An update referenced a row that does not exist.
    #[error("no stored result for {0}")]
    MissingRow(String),

    /// A create collided with an existing row.
    #[error("stored result already exists for {0}")]
    Conflict(String),

    /// Reading or writing persisted state failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Reasons a batch could not be ingested.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// The blob is not well-formed markup.
    #[error("Malformed XML input: {0}")]
    MalformedInput(String),

    /// The root container is absent or holds no entries.
    #[error("No test results found")]
    NoResultsFound,

    /// A required field is absent or empty. Identity parts that are
    /// themselves missing are reported as `N/A`.
    #[error("Missing required fields in XML record for student: {student_number}, test: {test_id}.")]
    MissingRequiredField {
        student_number: String,
        test_id: String,
    },

    /// `scanned-on` is not a recognisable timestamp.
    #[error("Invalid date format for @scanned-on: '{raw}' (Student: {student_number}, Test: {test_id})")]
    InvalidDateFormat {
        raw: String,
        student_number: String,
        test_id: String,
    },

    /// One of the `summary-marks` attributes is not an integer.
    #[error("Invalid marks in XML data for student: {student_number}, test: {test_id}. Available='{available}', Obtained='{obtained}'.")]
    InvalidMarks {
        available: String,
        obtained: String,
        student_number: String,
        test_id: String,
    },

    /// Reconciliation left nothing to write.
    #[error("No valid records found in XML after validation")]
    NoValidRecordsAfterReconciliation,

    /// The repository failed; nothing from the batch was applied.
    #[error("Repository failure: {0}")]
    RepositoryFailure(#[from] RepositoryError),
}

/// An ingestion failure as seen by callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to import and ingest test results: {kind}")]
pub struct IngestFailure {
    kind: IngestError,
}

impl IngestFailure {
    /// The specific failure.
    pub fn kind(&self) -> &IngestError {
        &self.kind
    }

    /// Returns `true` if the batch itself was at fault rather than the store.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self.kind, IngestError::RepositoryFailure(_))
    }
}

impl From<IngestError> for IngestFailure {
    fn from(kind: IngestError) -> Self {
        Self { kind }
    }
}

impl From<RepositoryError> for IngestFailure {
    fn from(err: RepositoryError) -> Self {
        Self {
            kind: IngestError::RepositoryFailure(err),
        }
    }
}

/// An aggregation failure. "No data" is not a failure; see
/// [`crate::engine::ResultsEngine::aggregate`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to aggregate test results: Repository failure: {0}")]
pub struct AggregateFailure(#[from] pub RepositoryError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_carries_prefix() {
        let failure = IngestFailure::from(IngestError::NoResultsFound);
        assert_eq!(
            failure.to_string(),
            "Failed to import and ingest test results: No test results found"
        );
        assert!(failure.to_string().starts_with(INGEST_FAILURE_PREFIX));
        assert!(failure.is_invalid_input());
    }

    #[test]
    fn aggregate_failure_carries_prefix() {
        let failure = AggregateFailure(RepositoryError::Unavailable("offline".into()));
        assert!(failure.to_string().starts_with(AGGREGATE_FAILURE_PREFIX));
    }

    #[test]
    fn missing_field_message() {
        let err = IngestError::MissingRequiredField {
            student_number: NOT_AVAILABLE.into(),
            test_id: "T101".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required fields in XML record for student: N/A, test: T101."
        );
    }

    #[test]
    fn invalid_marks_message() {
        let err = IngestError::InvalidMarks {
            available: "100".into(),
            obtained: "eighty-five".into(),
            student_number: "S002".into(),
            test_id: "T102".into(),
        };
        assert_eq!(
            IngestFailure::from(err).to_string(),
            "Failed to import and ingest test results: Invalid marks in XML data for student: S002, test: T102. Available='100', Obtained='eighty-five'."
        );
    }

    #[test]
    fn repository_failure_is_not_input_error() {
        let failure = IngestFailure::from(RepositoryError::TransactionAborted("disk full".into()));
        assert!(!failure.is_invalid_input());
        assert_eq!(
            failure.to_string(),
            "Failed to import and ingest test results: Repository failure: transaction aborted: disk full"
        );
    }
}
