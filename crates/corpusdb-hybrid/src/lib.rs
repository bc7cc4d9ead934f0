//! corpusdb-hybrid
//!
//! Hybrid retrieval: vector and keyword candidates fused with Reciprocal Rank
//! Fusion, gated on corpus completeness.

pub mod fusion;
pub mod retriever;
pub mod sampling;

pub use fusion::{reciprocal_rank_fusion, FusedCandidate, RRF_K};
pub use retriever::HybridRetriever;
pub use sampling::CandidateSelection;
