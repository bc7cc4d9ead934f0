use chrono::{DateTime, Utc};
use serde::Serialize;

use corpusdb_core::error::Result;
use corpusdb_core::types::{Component, ComponentStatus};

use crate::plan::IngestAction;

/// A failed attempt that was retried.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RetryEvent {
    pub operation: String,
    pub attempt: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub corpus: String,
    pub action: IngestAction,
    pub chunks_written: usize,
    /// Chunks that received a context summary in this run.
    pub chunks_contextualized: usize,
    pub vectors_upserted: usize,
    /// Chunks that already had vectors and were not re-embedded.
    pub vectors_skipped: usize,
    pub keyword_indexed: bool,
    pub retries: Vec<RetryEvent>,
    /// Result of a fresh status check after the run.
    pub complete: bool,
    pub elapsed_ms: u64,
}

impl IngestionReport {
    pub fn new(corpus: &str, action: IngestAction) -> Self {
        Self {
            corpus: corpus.to_string(),
            action,
            chunks_written: 0,
            chunks_contextualized: 0,
            vectors_upserted: 0,
            vectors_skipped: 0,
            keyword_indexed: false,
            retries: Vec::new(),
            complete: false,
            elapsed_ms: 0,
        }
    }
}

/// Per-corpus result of a bulk run; one failure never hides the others.
#[derive(Debug)]
pub struct CorpusOutcome {
    pub corpus: String,
    pub result: Result<IngestionReport>,
}

impl CorpusOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Ran without error and the corpus is now usable for retrieval.
    pub fn is_complete(&self) -> bool {
        self.result.as_ref().is_ok_and(|r| r.complete)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub name: String,
    pub display_name: String,
    pub is_active: bool,
    /// Chunks found on disk by this status check, not the count last recorded in the registry.
    pub chunk_count: usize,
    pub last_processed: Option<DateTime<Utc>>,
    pub complete: bool,
    pub missing_components: Vec<Component>,
    pub status: Option<ComponentStatus>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentFailure {
    pub component: Component,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub corpus: String,
    pub removed: Vec<Component>,
    pub failures: Vec<ComponentFailure>,
    /// The registry entry is only removed once every artifact is gone.
    pub entry_removed: bool,
}

impl DeletionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.entry_removed
    }
}
