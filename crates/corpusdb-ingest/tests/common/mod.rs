#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tempfile::TempDir;

use corpusdb_core::traits::{Contextualizer, EmbeddingClient, KeywordIndex, VectorIndex};
use corpusdb_core::{
    Chunk, ChunkId, ChunkStore, CorpusEntry, CorpusRegistry, Error, FileType, IndexProbe, Result, SearchHit, SourceSpec,
    VectorRecord,
};
use corpusdb_ingest::{IngestionPipeline, RetryPolicy};

/// Any batch containing this word fails on every attempt.
pub const POISON: &str = "POISON";

#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    /// Number of upcoming calls that fail with a transient error.
    pub transient_failures: AtomicUsize,
    /// Every text that was embedded successfully, in call order.
    pub texts: Mutex<Vec<String>>,
}

impl EmbeddingClient for FakeEmbedder {
    fn model_id(&self) -> &str {
        "fake"
    }
    fn dim(&self) -> usize {
        2
    }
    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail_once = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if fail_once {
            Err(Error::Embedding("503 service unavailable".into()))
        } else if texts.iter().any(|t| t.contains(POISON)) {
            Err(Error::Embedding("upstream rejected batch".into()))
        } else {
            self.texts.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        };
        Box::pin(async move { result })
    }
}

/// Summarizes a window as `summary of <first word>`; fails on windows containing `POISON`.
#[derive(Default)]
pub struct FakeContextualizer {
    pub windows: Mutex<Vec<String>>,
    pub transient_failures: AtomicUsize,
}

impl Contextualizer for FakeContextualizer {
    fn model_id(&self) -> &str {
        "fake-chat"
    }
    fn summarize<'a>(&'a self, window: &'a str) -> BoxFuture<'a, Result<String>> {
        let fail_once = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if fail_once {
            Err(Error::Context("429 too many requests".into()))
        } else if window.contains(POISON) {
            Err(Error::Context("upstream rejected window".into()))
        } else {
            self.windows.lock().unwrap().push(window.to_string());
            let first = window.split_whitespace().next().unwrap_or_default();
            Ok(format!("summary of {first}"))
        };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct MemVectors {
    pub rows: Mutex<HashMap<String, BTreeMap<ChunkId, u64>>>,
    pub upsert_calls: AtomicUsize,
    pub drops: AtomicUsize,
    /// Successful upserts left before every further upsert fails; `None` is unlimited.
    pub upsert_budget: Mutex<Option<usize>>,
    pub fail_drop: AtomicBool,
}

impl MemVectors {
    pub fn ids(&self, corpus: &str) -> Vec<ChunkId> {
        self.rows.lock().unwrap().get(corpus).map(|m| m.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn insert_raw(&self, corpus: &str, id: &str) {
        self.rows.lock().unwrap().entry(corpus.to_string()).or_default().insert(id.to_string(), 999);
    }

    pub fn clear(&self, corpus: &str) {
        self.rows.lock().unwrap().remove(corpus);
    }
}

impl VectorIndex for MemVectors {
    fn upsert<'a>(&'a self, corpus: &'a str, records: &'a [VectorRecord]) -> BoxFuture<'a, Result<usize>> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let allowed = {
            let mut budget = self.upsert_budget.lock().unwrap();
            match budget.as_mut() {
                None => true,
                Some(0) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
            }
        };
        let result = if allowed {
            let mut rows = self.rows.lock().unwrap();
            let table = rows.entry(corpus.to_string()).or_default();
            for r in records {
                table.insert(r.chunk_id.clone(), r.ordinal);
            }
            Ok(records.len())
        } else {
            Err(Error::VectorStore("connection reset".into()))
        };
        Box::pin(async move { result })
    }

    fn query<'a>(&'a self, _corpus: &'a str, _vector: &'a [f32], _limit: usize) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn chunk_ids<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, Result<Option<Vec<ChunkId>>>> {
        let ids = self.rows.lock().unwrap().get(corpus).map(|m| m.keys().cloned().collect());
        Box::pin(async move { Ok(ids) })
    }

    fn drop_corpus<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = if self.fail_drop.load(Ordering::SeqCst) {
            Err(Error::VectorStore("permission denied".into()))
        } else {
            self.drops.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().unwrap().remove(corpus);
            Ok(())
        };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct MemKeywords {
    pub built: Mutex<HashMap<String, Vec<ChunkId>>>,
    /// The text each corpus was last built from, one entry per chunk.
    pub texts: Mutex<HashMap<String, Vec<String>>>,
    pub build_calls: AtomicUsize,
    pub fail_remove: AtomicBool,
}

impl MemKeywords {
    pub fn ids(&self, corpus: &str) -> Vec<ChunkId> {
        self.built.lock().unwrap().get(corpus).cloned().unwrap_or_default()
    }
}

impl KeywordIndex for MemKeywords {
    fn build(&self, corpus: &str, chunks: &[Chunk]) -> Result<()> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let ids = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        self.built.lock().unwrap().insert(corpus.to_string(), ids);
        let texts = chunks.iter().map(Chunk::indexed_text).collect();
        self.texts.lock().unwrap().insert(corpus.to_string(), texts);
        Ok(())
    }

    fn query(&self, _corpus: &str, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    fn chunk_ids(&self, corpus: &str) -> Result<Option<Vec<ChunkId>>> {
        Ok(self.built.lock().unwrap().get(corpus).cloned())
    }

    fn remove(&self, corpus: &str) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(Error::KeywordIndex("index directory is locked".into()));
        }
        self.built.lock().unwrap().remove(corpus);
        Ok(())
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub store: ChunkStore,
    pub registry: Arc<CorpusRegistry>,
    pub embedder: Arc<FakeEmbedder>,
    pub vectors: Arc<MemVectors>,
    pub keywords: Arc<MemKeywords>,
    pub pipeline: IngestionPipeline,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_contextualizer(contextualizer: Arc<FakeContextualizer>) -> Self {
        Self::build(Some(contextualizer))
    }

    fn build(contextualizer: Option<Arc<FakeContextualizer>>) -> Self {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path().join("chunks"));
        let embedder = Arc::new(FakeEmbedder::default());
        let vectors = Arc::new(MemVectors::default());
        let keywords = Arc::new(MemKeywords::default());
        let probe = IndexProbe::new(store.clone(), vectors.clone(), keywords.clone());
        let registry = Arc::new(CorpusRegistry::open(tmp.path().join("registry.json"), Arc::new(probe)).unwrap());
        let mut pipeline = IngestionPipeline::new(registry.clone(), store.clone(), embedder.clone(), vectors.clone(), keywords.clone())
            .with_retry(RetryPolicy { max_attempts: 3, base_backoff: Duration::from_millis(1), timeout: Duration::from_secs(5) })
            .with_batch_size(2)
            .with_concurrency(2);
        if let Some(contextualizer) = contextualizer {
            pipeline = pipeline.with_contextualizer(contextualizer);
        }
        Self { tmp, store, registry, embedder, vectors, keywords, pipeline }
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.tmp.path().join("raw").join(format!("{name}.txt"))
    }

    pub fn write_source(&self, name: &str, paragraphs: &[&str]) {
        let path = self.source_path(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, paragraphs.join("\n\n")).unwrap();
    }

    /// Write the source and register the corpus.
    pub async fn add(&self, name: &str, paragraphs: &[&str]) {
        self.write_source(name, paragraphs);
        let spec = SourceSpec { path: self.source_path(name), file_type: FileType::Txt };
        self.registry.register(CorpusEntry::new(name, spec)).await.unwrap();
    }

    pub fn chunk_ids(&self, name: &str) -> HashSet<ChunkId> {
        self.store.load(name).unwrap().unwrap_or_default().into_iter().map(|c| c.chunk_id).collect()
    }

    pub fn registry_bytes(&self) -> Vec<u8> {
        std::fs::read(self.tmp.path().join("registry.json")).unwrap()
    }

    pub fn writes(&self) -> (usize, usize, usize, usize) {
        (
            self.embedder.calls.load(Ordering::SeqCst),
            self.vectors.upsert_calls.load(Ordering::SeqCst),
            self.vectors.drops.load(Ordering::SeqCst),
            self.keywords.build_calls.load(Ordering::SeqCst),
        )
    }
}

pub const FABLE: [&str; 3] = [
    "A wise old man lived at the edge of the forest.",
    "The fox asked the crow for a song.",
    "The tortoise won the race against the hare.",
];
