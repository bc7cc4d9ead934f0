use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::Component;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corpus '{name}' is unavailable: {reason}")]
    CorpusUnavailable { name: String, reason: Unavailability },

    #[error("Ingestion of '{corpus}' failed after {attempts} attempt(s), {committed} vectors committed: {message}")]
    TransientIngestion {
        corpus: String,
        attempts: u32,
        committed: usize,
        message: String,
    },

    #[error("Corrupt {component} for corpus '{corpus}': {reason}")]
    IndexCorruption {
        corpus: String,
        component: Component,
        reason: String,
    },

    #[error("Embedding request failed: {0}")]
    Embedding(String),

    #[error("Context summary request failed: {0}")]
    Context(String),

    #[error("Vector store operation failed: {0}")]
    VectorStore(String),

    #[error("Keyword index operation failed: {0}")]
    KeywordIndex(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors worth retrying: remote model calls, vector store writes and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Context(_) | Error::VectorStore(_) | Error::Timeout(_))
    }

    pub fn corruption(corpus: &str, component: Component, reason: impl fmt::Display) -> Self {
        Error::IndexCorruption {
            corpus: corpus.to_string(),
            component,
            reason: reason.to_string(),
        }
    }
}

/// Why a corpus cannot serve retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailability {
    Unknown,
    Inactive,
    Incomplete { missing: Vec<Component> },
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailability::Unknown => f.write_str("not registered"),
            Unavailability::Inactive => f.write_str("inactive"),
            Unavailability::Incomplete { missing } => {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                write!(f, "missing {}", names.join(", "))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
