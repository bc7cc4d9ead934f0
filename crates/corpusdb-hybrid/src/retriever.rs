use std::collections::HashMap;
use std::sync::Arc;

use corpusdb_core::chunk_store::ChunkStore;
use corpusdb_core::config::RetrievalSettings;
use corpusdb_core::error::{Error, Result, Unavailability};
use corpusdb_core::registry::CorpusRegistry;
use corpusdb_core::traits::{EmbeddingClient, KeywordIndex, VectorIndex};
use corpusdb_core::types::{Chunk, Component, CorpusEntry, RetrievalResult};

use crate::fusion::reciprocal_rank_fusion;
use crate::sampling::CandidateSelection;

/// Queries the vector and keyword indexes of one corpus and fuses the two
/// rankings. Read-only: it never writes artifacts or registry entries.
pub struct HybridRetriever {
    registry: Arc<CorpusRegistry>,
    chunks: ChunkStore,
    embedder: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorIndex>,
    keywords: Arc<dyn KeywordIndex>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        registry: Arc<CorpusRegistry>,
        chunks: ChunkStore,
        embedder: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorIndex>,
        keywords: Arc<dyn KeywordIndex>,
        settings: RetrievalSettings,
    ) -> Self {
        Self { registry, chunks, embedder, vectors, keywords, settings }
    }

    /// Candidates requested from each engine: `max(top_k * candidate_factor, min_candidates)`.
    pub fn candidate_depth(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.settings.candidate_factor).max(self.settings.min_candidates)
    }

    pub async fn list_active_corpuses(&self) -> Vec<CorpusEntry> {
        self.registry.list_active().await
    }

    /// `randomize` switches candidate selection to weighted sampling with a fresh seed.
    pub async fn retrieve(&self, corpus: &str, query: &str, top_k: usize, randomize: bool) -> Result<Vec<RetrievalResult>> {
        let selection = if randomize {
            CandidateSelection::WeightedSample { pool_factor: self.settings.random_pool_factor, seed: None }
        } else {
            CandidateSelection::TopN
        };
        self.retrieve_with(corpus, query, top_k, &selection).await
    }

    pub async fn retrieve_with(
        &self,
        corpus: &str,
        query: &str,
        top_k: usize,
        selection: &CandidateSelection,
    ) -> Result<Vec<RetrievalResult>> {
        self.ensure_available(corpus).await?;
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let n = self.candidate_depth(top_k);
        let pool = selection.pool_size(n);
        let k = self.settings.rrf_k;

        let query_vec = self.embedder.embed(query).await?;
        let vector_hits = self.vectors.query(corpus, &query_vec, pool).await?;
        let keyword_hits = {
            let keywords = self.keywords.clone();
            let (corpus, query) = (corpus.to_string(), query.to_string());
            tokio::task::spawn_blocking(move || keywords.query(&corpus, &query, pool))
                .await
                .map_err(|e| Error::Operation(format!("keyword query task failed: {e}")))??
        };

        let mut rng = selection.rng();
        let vector_hits = selection.select(vector_hits, n, k, &mut rng)?;
        let keyword_hits = selection.select(keyword_hits, n, k, &mut rng)?;
        tracing::debug!(corpus, vector = vector_hits.len(), keyword = keyword_hits.len(), "fusing candidates");

        let mut fused = reciprocal_rank_fusion(&vector_hits, &keyword_hits, k);
        fused.truncate(top_k);

        let mut chunks = self.chunks_by_id(corpus)?;
        fused
            .into_iter()
            .map(|f| {
                let chunk = chunks.remove(f.id.as_str()).ok_or_else(|| {
                    Error::corruption(corpus, Component::Chunks, format!("indexed chunk {} has no text", f.id))
                })?;
                Ok(RetrievalResult {
                    chunk_id: f.id,
                    text: chunk.text,
                    context: chunk.context,
                    fused_score: f.score,
                    vector_rank: f.vector_rank,
                    keyword_rank: f.keyword_rank,
                })
            })
            .collect()
    }

    async fn ensure_available(&self, corpus: &str) -> Result<()> {
        let unavailable = |reason| Error::CorpusUnavailable { name: corpus.to_string(), reason };
        let entry = match self.registry.get(corpus).await {
            Ok(entry) => entry,
            Err(Error::NotFound(_)) => return Err(unavailable(Unavailability::Unknown)),
            Err(e) => return Err(e),
        };
        if !entry.is_active {
            return Err(unavailable(Unavailability::Inactive));
        }
        let status = self.registry.compute_status(corpus).await?;
        if !status.is_complete() {
            return Err(unavailable(Unavailability::Incomplete { missing: status.missing() }));
        }
        Ok(())
    }

    fn chunks_by_id(&self, corpus: &str) -> Result<HashMap<String, Chunk>> {
        let chunks = self
            .chunks
            .load(corpus)?
            .ok_or_else(|| Error::corruption(corpus, Component::Chunks, "chunk file disappeared"))?;
        Ok(chunks.into_iter().map(|c| (c.chunk_id.clone(), c)).collect())
    }
}
