use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::chunk_store::ChunkStore;
use crate::error::Result;
use crate::traits::{ArtifactProbe, KeywordIndex, VectorIndex};
use crate::types::{ChunkId, ComponentState, ComponentStatus};

/// Reads all three artifact stores on every call.
pub struct IndexProbe {
    chunks: ChunkStore,
    vectors: Arc<dyn VectorIndex>,
    keywords: Arc<dyn KeywordIndex>,
}

impl IndexProbe {
    pub fn new(chunks: ChunkStore, vectors: Arc<dyn VectorIndex>, keywords: Arc<dyn KeywordIndex>) -> Self {
        Self { chunks, vectors, keywords }
    }

    async fn status(&self, corpus: &str) -> ComponentStatus {
        let (chunks, chunk_ids) = match self.chunks.load(corpus) {
            Ok(Some(chunks)) => {
                let ids: HashSet<ChunkId> = chunks.into_iter().map(|c| c.chunk_id).collect();
                (ComponentState::Present, Some(ids))
            }
            Ok(None) => (ComponentState::Missing, None),
            Err(e) => (ComponentState::Corrupt { reason: e.to_string() }, None),
        };
        let chunk_count = chunk_ids.as_ref().map_or(0, HashSet::len);

        let vector_index = index_state(self.vectors.chunk_ids(corpus).await, chunk_ids.as_ref());
        let keyword_index = index_state(self.keywords.chunk_ids(corpus), chunk_ids.as_ref());

        ComponentStatus { chunks, vector_index, keyword_index, chunk_count }
    }
}

impl ArtifactProbe for IndexProbe {
    fn probe<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, ComponentStatus> {
        Box::pin(self.status(corpus))
    }
}

/// Compare the ids an index holds against the current chunk set.
pub fn index_state(indexed: Result<Option<Vec<ChunkId>>>, expected: Option<&HashSet<ChunkId>>) -> ComponentState {
    let ids = match indexed {
        Ok(Some(ids)) => ids,
        Ok(None) => return ComponentState::Missing,
        Err(e) => return ComponentState::Corrupt { reason: e.to_string() },
    };
    let unique: HashSet<&ChunkId> = ids.iter().collect();
    let Some(expected) = expected else {
        return if unique.is_empty() {
            ComponentState::Missing
        } else {
            ComponentState::Stale { stale: unique.len() }
        };
    };
    let stale = unique.iter().filter(|id| !expected.contains(id.as_str())).count();
    if stale > 0 {
        return ComponentState::Stale { stale };
    }
    if unique.len() < expected.len() {
        return ComponentState::Incomplete { indexed: unique.len(), expected: expected.len() };
    }
    ComponentState::Present
}
