//! Repository trait definitions.
//!
//! Storage engines implement [`ResultRepository`]; `markr-store` provides the
//! in-memory and snapshot-file implementations. All writes for one ingestion
//! go through a single [`UnitOfWork`], driven by [`run_in_transaction`].

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::RepositoryError;
use crate::model::{CanonicalResult, ResultKey, StoredResult};

// ---------------------------------------------------------------------------
// Repository traits
// ---------------------------------------------------------------------------

/// A durable collection of stored results, unique per [`ResultKey`].
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Human-readable backend name (e.g. "memory").
    fn name(&self) -> &str;

    /// All stored results for a test, in no particular order.
    async fn find_all_by_test_id(&self, test_id: &str)
        -> Result<Vec<StoredResult>, RepositoryError>;

    /// Open a unit of work. Its writes are invisible to readers until
    /// [`UnitOfWork::commit`] succeeds.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

/// One atomic group of reads and writes.
///
/// Dropping a unit of work without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Stored results for exactly the given identities, in one lookup.
    async fn find_existing_by_keys(
        &mut self,
        keys: &[ResultKey],
    ) -> Result<Vec<StoredResult>, RepositoryError>;

    /// Insert a new row for `record`.
    async fn create_result(
        &mut self,
        record: &CanonicalResult,
    ) -> Result<StoredResult, RepositoryError>;

    /// Overwrite `existing` with `record`.
    async fn update_result(
        &mut self,
        existing: &StoredResult,
        record: &CanonicalResult,
    ) -> Result<StoredResult, RepositoryError>;

    /// Apply every staged write, or none of them.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// Discard every staged write.
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

// ---------------------------------------------------------------------------
// Transaction helper
// ---------------------------------------------------------------------------

/// Run `work` inside one unit of work: commit if it succeeds, roll back if it
/// fails.
///
/// ```ignore
/// let created = run_in_transaction(repo, move |uow| {
///     Box::pin(async move {
///         uow.create_result(&record).await?;
///         Ok::<_, IngestError>(1)
///     })
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<T, E, F>(repo: &dyn ResultRepository, work: F) -> Result<T, E>
where
    T: Send,
    E: From<RepositoryError> + std::fmt::Display + Send,
    F: for<'u> FnOnce(&'u mut dyn UnitOfWork) -> BoxFuture<'u, Result<T, E>> + Send,
{
    let mut uow = repo.begin().await?;
    match work(uow.as_mut()).await {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!(error = %err, "unit of work failed, rolling back");
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
