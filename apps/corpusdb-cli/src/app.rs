use std::path::PathBuf;
use std::sync::Arc;

use corpusdb_core::config::Settings;
use corpusdb_core::error::Result;
use corpusdb_core::traits::{EmbeddingClient, KeywordIndex, VectorIndex};
use corpusdb_core::{ChunkStore, CorpusRegistry, IndexProbe};
use corpusdb_embed::{contextualizer_from_settings, embedder_from_settings};
use corpusdb_hybrid::HybridRetriever;
use corpusdb_ingest::IngestionPipeline;
use corpusdb_text::TantivyKeywordIndex;
use corpusdb_vector::LanceVectorIndex;

/// Every store wired to one data root:
/// `chunks/<name>/`, `vectors/<name>/`, `keyword/<name>/` and the registry file.
pub struct App {
    pub settings: Settings,
    pub root: PathBuf,
    pub registry: Arc<CorpusRegistry>,
    pub pipeline: IngestionPipeline,
    pub retriever: HybridRetriever,
}

impl App {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let embedder = embedder_from_settings(&settings.embedding)?;
        Self::with_embedder(settings, embedder)
    }

    pub fn with_embedder(settings: Settings, embedder: Arc<dyn EmbeddingClient>) -> Result<Self> {
        let root = settings.data.root_path();
        std::fs::create_dir_all(&root)?;

        let chunks = ChunkStore::new(root.join("chunks"));
        let vectors: Arc<dyn VectorIndex> = Arc::new(
            LanceVectorIndex::new(root.join("vectors"), embedder.dim()).with_overfetch(settings.retrieval.vector_overfetch),
        );
        let keywords: Arc<dyn KeywordIndex> = Arc::new(TantivyKeywordIndex::new(root.join("keyword")));
        let probe = IndexProbe::new(chunks.clone(), vectors.clone(), keywords.clone());
        let registry = Arc::new(CorpusRegistry::open(settings.data.registry_path(), Arc::new(probe))?);

        let mut pipeline = IngestionPipeline::new(
            registry.clone(),
            chunks.clone(),
            embedder.clone(),
            vectors.clone(),
            keywords.clone(),
        )
        .with_settings(&settings);
        if let Some(contextualizer) = contextualizer_from_settings(&settings.context)? {
            pipeline = pipeline.with_contextualizer(contextualizer);
        }
        let retriever = HybridRetriever::new(
            registry.clone(),
            chunks,
            embedder.clone(),
            vectors,
            keywords,
            settings.retrieval.clone(),
        );
        tracing::debug!(root = %root.display(), model = embedder.model_id(), "opened data root");

        Ok(Self { settings, root, registry, pipeline, retriever })
    }
}
