use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, ComponentStatus, SearchHit, VectorRecord};

/// Turns text into fixed-length dense vectors.
pub trait EmbeddingClient: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-small`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// One vector per input, in input order.
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;

    fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(async move {
            let batch = vec![text.to_string()];
            let mut vectors = self.embed_batch(&batch).await?;
            vectors
                .pop()
                .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
        })
    }
}

/// Writes a short summary situating a chunk within its document.
pub trait Contextualizer: Send + Sync {
    fn model_id(&self) -> &str;
    /// `window` is the chunk together with the source text around it.
    fn summarize<'a>(&'a self, window: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Per-corpus dense index keyed by chunk id.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by `chunk_id`; returns the number of rows written.
    fn upsert<'a>(&'a self, corpus: &'a str, records: &'a [VectorRecord]) -> BoxFuture<'a, Result<usize>>;
    /// Up to `limit` hits by descending cosine similarity, ties by ordinal.
    fn query<'a>(&'a self, corpus: &'a str, vector: &'a [f32], limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
    /// All indexed chunk ids, or `None` when the corpus has no index at all.
    fn chunk_ids<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, Result<Option<Vec<ChunkId>>>>;
    /// Remove the corpus index; absent indexes are not an error.
    fn drop_corpus<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Per-corpus BM25 index, built in one piece from the chunk set.
pub trait KeywordIndex: Send + Sync {
    /// Replace the corpus index atomically with one built from `chunks`.
    fn build(&self, corpus: &str, chunks: &[Chunk]) -> Result<()>;
    fn query(&self, corpus: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
    fn chunk_ids(&self, corpus: &str) -> Result<Option<Vec<ChunkId>>>;
    fn remove(&self, corpus: &str) -> Result<()>;
}

/// Inspects artifact stores. Implementations must never cache.
pub trait ArtifactProbe: Send + Sync {
    fn probe<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, ComponentStatus>;
}
