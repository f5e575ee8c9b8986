//! Intra-batch deduplication.
//!
//! Groups records by [`ResultKey`] and keeps the best scan per identity:
//! higher obtained marks, then higher available marks, then the later record.

use std::collections::HashMap;

use crate::error::IngestError;
use crate::model::{CanonicalResult, ResultKey};

/// Reduce a decoded batch to one record per identity.
///
/// Output order follows the first appearance of each identity.
pub fn reconcile(records: Vec<CanonicalResult>) -> Result<Vec<CanonicalResult>, IngestError> {
    let mut slots: HashMap<ResultKey, usize> = HashMap::with_capacity(records.len());
    let mut best: Vec<CanonicalResult> = Vec::new();

    for record in records {
        match slots.get(&record.key()) {
            Some(&index) => {
                if record.score() >= best[index].score() {
                    best[index] = record;
                }
            }
            None => {
                slots.insert(record.key(), best.len());
                best.push(record);
            }
        }
    }

    if best.is_empty() {
        return Err(IngestError::NoValidRecordsAfterReconciliation);
    }
    Ok(best)
}
