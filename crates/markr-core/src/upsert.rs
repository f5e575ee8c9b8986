//! Create-or-improve coordinator.
//!
//! Compares a reconciled batch against stored state and writes new rows and
//! improvements inside one unit of work. A stored result is only overwritten
//! when the incoming scan has more obtained marks or more available marks.

use std::collections::HashMap;

use crate::error::IngestError;
use crate::model::{CanonicalResult, ResultKey, StoredResult};
use crate::traits::{run_in_transaction, ResultRepository};

/// The writes a batch needs, decided against existing rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertPlan {
    pub creates: Vec<CanonicalResult>,
    pub updates: Vec<(StoredResult, CanonicalResult)>,
    /// Records that did not improve on their stored row.
    pub unchanged: usize,
}

impl UpsertPlan {
    /// Classify every record as create, update or no-op.
    pub fn build(records: Vec<CanonicalResult>, existing: Vec<StoredResult>) -> Self {
        let mut stored: HashMap<ResultKey, StoredResult> =
            existing.into_iter().map(|row| (row.key(), row)).collect();
        let mut plan = UpsertPlan::default();

        for record in records {
            match stored.remove(&record.key()) {
                None => {
                    tracing::debug!(key = %record.key(), "new result");
                    plan.creates.push(record);
                }
                Some(row) if row.is_improved_by(&record) => {
                    tracing::debug!(
                        key = %record.key(),
                        from = ?(row.marks_obtained, row.marks_available),
                        to = ?(record.marks_obtained, record.marks_available),
                        "improved result"
                    );
                    plan.updates.push((row, record));
                }
                Some(row) => {
                    tracing::debug!(
                        key = %record.key(),
                        stored = ?(row.marks_obtained, row.marks_available),
                        "not an improvement, keeping stored result"
                    );
                    plan.unchanged += 1;
                }
            }
        }

        plan
    }
}

/// Counts for one applied batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertOutcome {
    /// Rows actually written.
    pub fn affected(&self) -> usize {
        self.created + self.updated
    }
}

/// Write a reconciled batch atomically.
///
/// `records` must hold at most one record per identity.
pub async fn apply_batch(
    repo: &dyn ResultRepository,
    records: Vec<CanonicalResult>,
) -> Result<UpsertOutcome, IngestError> {
    run_in_transaction(repo, move |uow| {
        Box::pin(async move {
            let keys: Vec<ResultKey> = records.iter().map(CanonicalResult::key).collect();
            let existing = uow.find_existing_by_keys(&keys).await?;
            let plan = UpsertPlan::build(records, existing);

            let mut outcome = UpsertOutcome {
                unchanged: plan.unchanged,
                ..UpsertOutcome::default()
            };
            for record in &plan.creates {
                uow.create_result(record).await?;
                outcome.created += 1;
            }
            for (row, record) in &plan.updates {
                uow.update_result(row, record).await?;
                outcome.updated += 1;
            }
            Ok::<_, IngestError>(outcome)
        })
    })
    .await
}
