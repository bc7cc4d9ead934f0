use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};

use corpusdb_core::chunk_store::ChunkStore;
use corpusdb_core::chunker::{surrounding_text, Chunker};
use corpusdb_core::config::Settings;
use corpusdb_core::error::{Error, Result};
use corpusdb_core::registry::CorpusRegistry;
use corpusdb_core::source::load_source;
use corpusdb_core::traits::{Contextualizer, EmbeddingClient, KeywordIndex, VectorIndex};
use corpusdb_core::types::{Chunk, ChunkId, Component, CorpusEntry, VectorRecord};

use crate::locks::CorpusLocks;
use crate::plan::{plan, IngestAction};
use crate::report::{ComponentFailure, CorpusOutcome, DeletionReport, IngestionReport, StatusEntry};
use crate::retry::{Exhausted, RetryPolicy};

/// Drives a corpus from whatever state its artifacts are in to complete,
/// performing only the steps its status says are missing.
pub struct IngestionPipeline {
    registry: Arc<CorpusRegistry>,
    chunks: ChunkStore,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingClient>,
    contextualizer: Option<Arc<dyn Contextualizer>>,
    context_radius: usize,
    vectors: Arc<dyn VectorIndex>,
    keywords: Arc<dyn KeywordIndex>,
    locks: CorpusLocks,
    retry: RetryPolicy,
    batch_size: usize,
    concurrency: usize,
    show_progress: bool,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<CorpusRegistry>,
        chunks: ChunkStore,
        embedder: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorIndex>,
        keywords: Arc<dyn KeywordIndex>,
    ) -> Self {
        Self {
            registry,
            chunks,
            chunker: Chunker::default(),
            embedder,
            contextualizer: None,
            context_radius: 10_000,
            vectors,
            keywords,
            locks: CorpusLocks::new(),
            retry: RetryPolicy::default(),
            batch_size: 32,
            concurrency: 1,
            show_progress: false,
        }
    }

    /// Apply chunking, retry, batching and progress settings in one go.
    #[must_use]
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_chunker(Chunker::new(settings.chunking.clone()))
            .with_retry(RetryPolicy::from_settings(&settings.ingest, &settings.embedding))
            .with_batch_size(settings.embedding.batch_size)
            .with_concurrency(settings.ingest.concurrency)
            .with_progress(settings.ingest.show_progress)
            .with_context_radius(settings.context.window_radius)
    }

    /// Summarize every chunk's surroundings on full rebuilds and index the summary with it.
    #[must_use]
    pub fn with_contextualizer(mut self, contextualizer: Arc<dyn Contextualizer>) -> Self {
        self.contextualizer = Some(contextualizer);
        self
    }

    #[must_use]
    pub fn with_context_radius(mut self, radius: usize) -> Self {
        self.context_radius = radius;
        self
    }

    #[must_use]
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn registry(&self) -> &Arc<CorpusRegistry> {
        &self.registry
    }

    /// Bring one corpus to complete. A corpus that is already complete is left
    /// untouched unless `force_rebuild` is set.
    pub async fn ingest(&self, corpus: &str, force_rebuild: bool) -> Result<IngestionReport> {
        let _guard = self.locks.acquire(corpus).await;
        let started = Instant::now();

        let entry = self.registry.get(corpus).await?;
        let status = self.registry.compute_status(corpus).await?;
        let action = plan(&status, force_rebuild);
        let mut report = IngestionReport::new(corpus, action.clone());

        if action == IngestAction::NoOp {
            tracing::info!(corpus, chunks = status.chunk_count, "corpus is complete, nothing to do");
            report.complete = true;
            report.elapsed_ms = elapsed_ms(started);
            return Ok(report);
        }

        tracing::info!(corpus, %action, chunks = %status.chunks, vectors = %status.vector_index, keyword = %status.keyword_index, "ingesting corpus");
        if let Err(e) = self.execute(&entry, &action, &mut report).await {
            tracing::error!(corpus, %action, committed = report.vectors_upserted, "ingestion failed: {e}");
            return Err(e);
        }
        self.finish(corpus, &mut report).await?;
        report.elapsed_ms = elapsed_ms(started);
        tracing::info!(
            corpus,
            complete = report.complete,
            chunks_written = report.chunks_written,
            vectors_upserted = report.vectors_upserted,
            retries = report.retries.len(),
            elapsed_ms = report.elapsed_ms,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Ingest every active corpus, at most `concurrency` at a time. Outcomes
    /// come back in registry order and a failure never stops the others.
    pub async fn ingest_all(&self, force_rebuild: bool) -> Vec<CorpusOutcome> {
        let names: Vec<String> = self.registry.list_active().await.into_iter().map(|e| e.name).collect();
        tracing::info!(corpora = names.len(), concurrency = self.concurrency, "ingesting all active corpora");
        futures::stream::iter(names)
            .map(|corpus| async move {
                let result = self.ingest(&corpus, force_rebuild).await;
                CorpusOutcome { corpus, result }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// The action `ingest` would take right now. Reads only.
    pub async fn dry_run(&self, corpus: &str, force_rebuild: bool) -> Result<IngestAction> {
        self.registry.get(corpus).await?;
        let status = self.registry.compute_status(corpus).await?;
        Ok(plan(&status, force_rebuild))
    }

    /// Fresh status for every registered corpus, broken ones included.
    pub async fn status_report(&self) -> Vec<StatusEntry> {
        let mut out = Vec::new();
        for entry in self.registry.list().await {
            let (status, error) = match self.registry.compute_status(&entry.name).await {
                Ok(status) => (Some(status), None),
                Err(e) => (None, Some(e.to_string())),
            };
            let complete = status.as_ref().is_some_and(|s| s.is_complete());
            let missing_components = status.as_ref().map_or_else(|| Component::ALL.to_vec(), |s| s.missing());
            out.push(StatusEntry {
                name: entry.name,
                display_name: entry.display_name,
                is_active: entry.is_active,
                chunk_count: status.as_ref().map_or(0, |s| s.chunk_count),
                last_processed: entry.last_processed,
                complete,
                missing_components,
                status,
                error,
            });
        }
        out
    }

    /// Remove all three artifacts, then the registry entry. The entry stays
    /// when any artifact could not be removed so the delete can be retried.
    pub async fn delete_corpus(&self, corpus: &str) -> Result<DeletionReport> {
        let _guard = self.locks.acquire(corpus).await;
        self.registry.get(corpus).await?;

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        let mut record = |component: Component, result: Result<()>| match result {
            Ok(()) => removed.push(component),
            Err(e) => {
                tracing::warn!(corpus, %component, "failed to remove artifact: {e}");
                failures.push(ComponentFailure { component, error: e.to_string() });
            }
        };
        record(Component::Chunks, self.chunks.remove(corpus));
        record(Component::VectorIndex, self.vectors.drop_corpus(corpus).await);
        record(Component::KeywordIndex, self.keywords.remove(corpus));

        let entry_removed = if failures.is_empty() { self.registry.delete(corpus).await? } else { false };
        tracing::info!(corpus, removed = removed.len(), failed = failures.len(), entry_removed, "deleted corpus");
        Ok(DeletionReport { corpus: corpus.to_string(), removed, failures, entry_removed })
    }

    async fn execute(&self, entry: &CorpusEntry, action: &IngestAction, report: &mut IngestionReport) -> Result<()> {
        let corpus = entry.name.as_str();
        match action {
            IngestAction::NoOp => Ok(()),
            IngestAction::FullRebuild => {
                let (source, mut chunks) = self.rechunk(entry).await?;
                self.contextualize(corpus, &source, &mut chunks, report).await?;
                // Old ids must not survive into the new chunk set.
                self.keywords.remove(corpus)?;
                self.vectors.drop_corpus(corpus).await?;
                self.chunks.write(corpus, &chunks)?;
                report.chunks_written = chunks.len();
                let count = chunks.len();
                self.registry.update(corpus, |e| e.chunk_count = count).await?;
                tracing::info!(corpus, chunks = count, "wrote chunks");

                self.embed_missing(corpus, &chunks, &HashSet::new(), report).await?;
                self.build_keyword(corpus, chunks, report).await
            }
            IngestAction::Reembed { reset_vectors, rebuild_keyword } => {
                let chunks = self.load_chunks(corpus)?;
                let existing: HashSet<ChunkId> = if *reset_vectors {
                    tracing::info!(corpus, "resetting vector index");
                    self.vectors.drop_corpus(corpus).await?;
                    HashSet::new()
                } else {
                    self.vectors.chunk_ids(corpus).await?.unwrap_or_default().into_iter().collect()
                };
                self.embed_missing(corpus, &chunks, &existing, report).await?;
                if *rebuild_keyword {
                    self.build_keyword(corpus, chunks, report).await?;
                }
                Ok(())
            }
            IngestAction::RebuildKeyword => {
                let chunks = self.load_chunks(corpus)?;
                self.build_keyword(corpus, chunks, report).await
            }
        }
    }

    /// The loaded source text and its chunks.
    async fn rechunk(&self, entry: &CorpusEntry) -> Result<(String, Vec<Chunk>)> {
        let source = entry.source.clone();
        let corpus = entry.name.clone();
        let chunker = self.chunker.clone();
        let (text, chunks) = tokio::task::spawn_blocking(move || -> Result<(String, Vec<Chunk>)> {
            let text = load_source(&source)?;
            let chunks = chunker.chunk(&corpus, &text);
            Ok((text, chunks))
        })
        .await
        .map_err(|e| Error::Operation(format!("chunking task failed: {e}")))??;
        if chunks.is_empty() {
            return Err(Error::Validation(format!(
                "source {} produced no chunks",
                entry.source.path.display()
            )));
        }
        Ok((text, chunks))
    }

    /// Runs before any artifact is touched, so a failure here leaves the corpus as it was.
    async fn contextualize(
        &self,
        corpus: &str,
        source: &str,
        chunks: &mut [Chunk],
        report: &mut IngestionReport,
    ) -> Result<()> {
        let Some(contextualizer) = &self.contextualizer else {
            return Ok(());
        };
        tracing::info!(corpus, chunks = chunks.len(), model = contextualizer.model_id(), "summarizing chunk context");
        let pb = self.progress_bar(chunks.len());
        for chunk in chunks.iter_mut() {
            let window = surrounding_text(source, chunk, self.context_radius);
            let summary = self
                .retry
                .run("contextualize", &mut report.retries, || contextualizer.summarize(window))
                .await
                .map_err(|e| ingestion_error(corpus, 0, e))?;
            chunk.context = Some(summary);
            report.chunks_contextualized += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(())
    }

    fn load_chunks(&self, corpus: &str) -> Result<Vec<Chunk>> {
        self.chunks
            .load(corpus)?
            .ok_or_else(|| Error::corruption(corpus, Component::Chunks, "chunk file disappeared"))
    }

    /// Embed and upsert every chunk not in `existing`, one committed batch at a time.
    async fn embed_missing(
        &self,
        corpus: &str,
        chunks: &[Chunk],
        existing: &HashSet<ChunkId>,
        report: &mut IngestionReport,
    ) -> Result<()> {
        let pending: Vec<&Chunk> = chunks.iter().filter(|c| !existing.contains(&c.chunk_id)).collect();
        report.vectors_skipped = chunks.len() - pending.len();
        if pending.is_empty() {
            return Ok(());
        }
        tracing::info!(corpus, pending = pending.len(), skipped = report.vectors_skipped, "embedding chunks");

        let pb = self.progress_bar(pending.len());
        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.indexed_text()).collect();
            let committed = report.vectors_upserted;
            let vectors = self
                .retry
                .run("embed", &mut report.retries, || self.embedder.embed_batch(&texts))
                .await
                .map_err(|e| ingestion_error(corpus, committed, e))?;
            if vectors.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorRecord {
                    chunk_id: chunk.chunk_id.clone(),
                    corpus_name: corpus.to_string(),
                    ordinal: chunk.index as u64,
                    vector,
                })
                .collect();
            self.retry
                .run("upsert", &mut report.retries, || self.vectors.upsert(corpus, &records))
                .await
                .map_err(|e| ingestion_error(corpus, committed, e))?;
            report.vectors_upserted += batch.len();
            pb.inc(batch.len() as u64);
            tracing::debug!(corpus, committed = report.vectors_upserted, "committed vector batch");
        }
        pb.finish_and_clear();
        Ok(())
    }

    async fn build_keyword(&self, corpus: &str, chunks: Vec<Chunk>, report: &mut IngestionReport) -> Result<()> {
        let keywords = self.keywords.clone();
        let name = corpus.to_string();
        tokio::task::spawn_blocking(move || keywords.build(&name, &chunks))
            .await
            .map_err(|e| Error::Operation(format!("keyword build task failed: {e}")))??;
        report.keyword_indexed = true;
        tracing::info!(corpus, "built keyword index");
        Ok(())
    }

    async fn finish(&self, corpus: &str, report: &mut IngestionReport) -> Result<()> {
        let status = self.registry.compute_status(corpus).await?;
        report.complete = status.is_complete();
        let complete = report.complete;
        let count = status.chunk_count;
        let now = Utc::now();
        self.registry
            .update(corpus, |e| {
                e.chunk_count = count;
                if complete {
                    e.last_processed = Some(now);
                }
            })
            .await?;
        if !complete {
            tracing::warn!(corpus, missing = ?status.missing(), "corpus still incomplete after ingestion");
        }
        Ok(())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn ingestion_error(corpus: &str, committed: usize, exhausted: Exhausted) -> Error {
    if exhausted.error.is_transient() {
        Error::TransientIngestion {
            corpus: corpus.to_string(),
            attempts: exhausted.attempts,
            committed,
            message: exhausted.error.to_string(),
        }
    } else {
        exhausted.error
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
