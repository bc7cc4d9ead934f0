//! Idempotent, resumable ingestion: classify each corpus from a fresh status
//! probe, run only the missing build steps, and record the outcome.

pub mod locks;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod retry;

pub use locks::CorpusLocks;
pub use pipeline::IngestionPipeline;
pub use plan::{plan, IngestAction};
pub use report::{ComponentFailure, CorpusOutcome, DeletionReport, IngestionReport, RetryEvent, StatusEntry};
pub use retry::{Exhausted, RetryPolicy};
