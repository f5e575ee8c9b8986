//! Ingestion and aggregation entry points.
//!
//! [`ResultsEngine`] wires the write path (decode, reconcile, upsert) and the
//! read path (aggregate) to one repository. It keeps no state of its own
//! between calls; aggregation always re-reads the repository.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AggregateFailure, IngestError, IngestFailure};
use crate::parser::decode_results;
use crate::reconcile::reconcile;
use crate::statistics::{summarize, AggregatedStatistics};
use crate::traits::ResultRepository;
use crate::upsert::apply_batch;

/// What one ingestion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Identifier attached to this batch's log span.
    pub batch_id: Uuid,
    /// Entries decoded from the document, duplicates included.
    pub entries: usize,
    /// Distinct (student, test) identities after reconciliation.
    pub distinct: usize,
    pub created: usize,
    pub updated: usize,
    /// Identities whose stored result was kept as is.
    pub unchanged: usize,
}

impl IngestSummary {
    /// Rows created or updated.
    pub fn affected(&self) -> usize {
        self.created + self.updated
    }
}

/// Ingestion and aggregation over one repository.
pub struct ResultsEngine {
    repository: Arc<dyn ResultRepository>,
}

impl ResultsEngine {
    pub fn new(repository: Arc<dyn ResultRepository>) -> Self {
        Self { repository }
    }

    /// Ingest an XML batch and return the number of rows created or updated.
    pub async fn ingest(&self, xml: &str) -> Result<usize, IngestFailure> {
        self.ingest_detailed(xml)
            .await
            .map(|summary| summary.affected())
    }

    /// Ingest an XML batch and report per-category counts.
    ///
    /// Any invalid entry rejects the whole batch before the repository is
    /// touched. Repository failures roll back every write of the batch.
    pub async fn ingest_detailed(&self, xml: &str) -> Result<IngestSummary, IngestFailure> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("ingest", %batch_id, backend = self.repository.name());

        async move {
            let result = self.run_ingest(batch_id, xml).await;
            match &result {
                Ok(summary) => tracing::info!(
                    entries = summary.entries,
                    created = summary.created,
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    "batch ingested"
                ),
                Err(err) => tracing::warn!(error = %err, "batch rejected"),
            }
            result.map_err(IngestFailure::from)
        }
        .instrument(span)
        .await
    }

    async fn run_ingest(&self, batch_id: Uuid, xml: &str) -> Result<IngestSummary, IngestError> {
        let records = decode_results(xml)?;
        let entries = records.len();

        let reconciled = reconcile(records)?;
        let distinct = reconciled.len();
        if distinct < entries {
            tracing::debug!(
                dropped = entries - distinct,
                "collapsed duplicate scans within batch"
            );
        }

        let outcome = apply_batch(self.repository.as_ref(), reconciled).await?;
        Ok(IngestSummary {
            batch_id,
            entries,
            distinct,
            created: outcome.created,
            updated: outcome.updated,
            unchanged: outcome.unchanged,
        })
    }

    /// Statistics for a test, or `None` if nothing is stored for it.
    pub async fn aggregate(
        &self,
        test_id: &str,
    ) -> Result<Option<AggregatedStatistics>, AggregateFailure> {
        let results = self.repository.find_all_by_test_id(test_id).await?;
        if results.is_empty() {
            tracing::info!(test_id, "no results found");
            return Ok(None);
        }

        let marks: Vec<(u32, u32)> = results
            .iter()
            .map(|r| (r.marks_obtained, r.marks_available))
            .collect();
        if marks.iter().all(|&(_, available)| available == 0) {
            tracing::warn!(
                test_id,
                count = marks.len(),
                "results exist but no marks are available, reporting zeroed statistics"
            );
        }

        Ok(summarize(&marks))
    }
}
