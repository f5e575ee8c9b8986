//! markr-core: Result ingestion, reconciliation and aggregation.
//!
//! This crate defines the data model, the XML decoder, the best-score merge
//! policy, the repository traits and the statistics that the rest of markr
//! builds on.

pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod reconcile;
pub mod statistics;
pub mod traits;
pub mod upsert;

pub use engine::{IngestSummary, ResultsEngine};
pub use error::{AggregateFailure, IngestError, IngestFailure, RepositoryError};
pub use model::{CanonicalResult, ResultKey, StoredResult};
pub use statistics::AggregatedStatistics;
pub use traits::{run_in_transaction, ResultRepository, UnitOfWork};
