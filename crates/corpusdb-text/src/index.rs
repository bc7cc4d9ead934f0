use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use corpusdb_core::error::Error;
use corpusdb_core::fsutil::remove_dir_if_exists;
use corpusdb_core::traits::KeywordIndex;
use corpusdb_core::types::{Chunk, ChunkId, Component, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, Fields};

const MANIFEST: &str = "chunk_ids.json";
const WRITER_BUDGET: usize = 50_000_000;

/// Keyword indexes under `root/<corpus>/`, each a Tantivy index plus a
/// `chunk_ids.json` manifest in document order.
///
/// Builds happen in a staging directory next to the live one and are swapped
/// in by rename, so a failed build leaves the previous index intact.
pub struct TantivyKeywordIndex {
	root: PathBuf,
}

struct OpenIndex {
	index: Index,
	reader: IndexReader,
	fields: Fields,
}

impl TantivyKeywordIndex {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn corpus_dir(&self, corpus: &str) -> PathBuf {
		self.root.join(corpus)
	}

	fn build_into(&self, corpus: &str, chunks: &[Chunk]) -> Result<usize> {
		fs::create_dir_all(&self.root).with_context(|| format!("creating {}", self.root.display()))?;
		let staging = tempfile::Builder::new().prefix(&format!(".{corpus}-")).tempdir_in(&self.root)?;

		let schema = build_schema();
		let index = Index::create_in_dir(staging.path(), schema.clone())?;
		register_tokenizer(&index);
		let fields = Fields::from_schema(&schema)?;
		let mut index_writer: IndexWriter = index.writer(WRITER_BUDGET)?;
		for c in chunks {
			index_writer.add_document(doc!(
				fields.chunk_id => c.chunk_id.clone(),
				fields.ordinal => c.index as u64,
				fields.text => c.indexed_text(),
			))?;
		}
		index_writer.commit()?;
		index_writer.wait_merging_threads()?;

		let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
		fs::write(staging.path().join(MANIFEST), serde_json::to_vec(&ids)?)?;

		let target = self.corpus_dir(corpus);
		remove_dir_if_exists(&target)?;
		let staged = staging.keep();
		fs::rename(&staged, &target).with_context(|| format!("moving {} into place", staged.display()))?;
		Ok(chunks.len())
	}

	fn open(&self, corpus: &str) -> Result<Option<OpenIndex>> {
		let dir = self.corpus_dir(corpus);
		if !dir.exists() {
			return Ok(None);
		}
		let index = Index::open_in_dir(&dir)?;
		register_tokenizer(&index);
		let fields = Fields::from_schema(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Some(OpenIndex { index, reader, fields }))
	}

	fn read_manifest(dir: &Path) -> Result<Vec<ChunkId>> {
		let raw = fs::read(dir.join(MANIFEST)).with_context(|| format!("reading {MANIFEST}"))?;
		Ok(serde_json::from_slice(&raw)?)
	}

	fn search(&self, corpus: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
		let open = self.open(corpus)?.ok_or_else(|| anyhow!("no keyword index for corpus '{corpus}'"))?;
		let terms = tokenize(&open.index, open.fields, query)?;
		if terms.is_empty() || limit == 0 {
			return Ok(Vec::new());
		}
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.iter()
			.map(|t| {
				let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(open.fields.text, t), IndexRecordOption::WithFreqs));
				(Occur::Should, q)
			})
			.collect();
		let q = BooleanQuery::new(clauses);

		let searcher = open.reader.searcher();
		// Collect every match so equal scores can be ordered by ordinal before truncating.
		let all = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX).max(1);
		let top_docs = searcher.search(&q, &TopDocs::with_limit(all))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let id = doc.get_first(open.fields.chunk_id).and_then(|v| v.as_str()).ok_or_else(|| anyhow!("document without chunk_id"))?.to_string();
			let ordinal = doc.get_first(open.fields.ordinal).and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
			hits.push(SearchHit { id, score, ordinal, source: SourceKind::Keyword });
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
		hits.truncate(limit);
		Ok(hits)
	}

	fn indexed_ids(&self, corpus: &str) -> Result<Option<Vec<ChunkId>>> {
		let Some(open) = self.open(corpus)? else { return Ok(None) };
		let ids = Self::read_manifest(&self.corpus_dir(corpus))?;
		let docs = open.reader.searcher().num_docs();
		if docs != ids.len() as u64 {
			return Err(anyhow!("manifest lists {} ids but index holds {docs} documents", ids.len()));
		}
		Ok(Some(ids))
	}
}

/// Analyze `query` with the same pipeline as indexed text; unique terms in order.
fn tokenize(index: &Index, fields: Fields, query: &str) -> Result<Vec<String>> {
	let mut analyzer = index.tokenizer_for_field(fields.text)?;
	let mut stream = analyzer.token_stream(query);
	let mut seen = HashSet::new();
	let mut terms = Vec::new();
	while stream.advance() {
		let text = stream.token().text.clone();
		if seen.insert(text.clone()) {
			terms.push(text);
		}
	}
	Ok(terms)
}

fn keyword_err(e: &anyhow::Error) -> Error {
	Error::KeywordIndex(format!("{e:#}"))
}

impl KeywordIndex for TantivyKeywordIndex {
	fn build(&self, corpus: &str, chunks: &[Chunk]) -> corpusdb_core::Result<()> {
		let count = self.build_into(corpus, chunks).map_err(|e| keyword_err(&e))?;
		tracing::info!(corpus, documents = count, "built keyword index");
		Ok(())
	}

	fn query(&self, corpus: &str, query: &str, limit: usize) -> corpusdb_core::Result<Vec<SearchHit>> {
		self.search(corpus, query, limit).map_err(|e| keyword_err(&e))
	}

	fn chunk_ids(&self, corpus: &str) -> corpusdb_core::Result<Option<Vec<ChunkId>>> {
		self.indexed_ids(corpus).map_err(|e| Error::corruption(corpus, Component::KeywordIndex, format!("{e:#}")))
	}

	fn remove(&self, corpus: &str) -> corpusdb_core::Result<()> {
		remove_dir_if_exists(&self.corpus_dir(corpus))?;
		tracing::debug!(corpus, "removed keyword index");
		Ok(())
	}
}
