//! corpusdb-embed
//!
//! Embedding clients: an OpenAI-compatible HTTP client and a deterministic
//! hash embedder for offline use. Also the optional chat client that writes
//! per-chunk context summaries.

use std::sync::Arc;

use corpusdb_core::config::{ContextProviderKind, ContextSettings, EmbeddingProviderKind, EmbeddingSettings};
use corpusdb_core::error::Result;
use corpusdb_core::traits::{Contextualizer, EmbeddingClient};

pub mod context;
pub mod hash;
pub mod http;

pub use context::ChatContextualizer;
pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

/// Build the configured embedding client.
pub fn embedder_from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingClient>> {
    match settings.provider {
        EmbeddingProviderKind::OpenAi => {
            tracing::info!(model = %settings.model, base_url = %settings.base_url, "using http embedder");
            Ok(Arc::new(HttpEmbedder::from_settings(settings)?))
        }
        EmbeddingProviderKind::Hash => {
            tracing::info!(dim = settings.dim, "using hash embedder");
            Ok(Arc::new(HashEmbedder::new(settings.dim)))
        }
    }
}

/// Build the configured contextualizer; `None` when chunks are indexed without context.
pub fn contextualizer_from_settings(settings: &ContextSettings) -> Result<Option<Arc<dyn Contextualizer>>> {
    match settings.provider {
        ContextProviderKind::None => Ok(None),
        ContextProviderKind::OpenAi => {
            tracing::info!(model = %settings.model, base_url = %settings.base_url, "using chat contextualizer");
            Ok(Some(Arc::new(ChatContextualizer::from_settings(settings)?)))
        }
    }
}
