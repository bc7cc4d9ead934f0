//! corpusdb-text
//!
//! Tantivy-backed BM25 keyword index, one index directory per corpus.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyKeywordIndex;
