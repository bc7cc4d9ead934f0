//! corpusdb-core
//!
//! Shared domain types, errors, configuration, chunking and the corpus
//! registry. Index backends implement the traits in `traits`.

pub mod chunk_store;
pub mod chunker;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod probe;
pub mod registry;
pub mod source;
pub mod traits;
pub mod types;

pub use chunk_store::ChunkStore;
pub use chunker::{Chunker, ChunkingConfig};
pub use error::{Error, Result, Unavailability};
pub use probe::IndexProbe;
pub use registry::CorpusRegistry;
pub use types::*;
