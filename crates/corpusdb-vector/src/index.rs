use anyhow::{anyhow, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatchIterator, StringArray};
use futures::future::BoxFuture;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::PathBuf;

use corpusdb_core::error::Error;
use corpusdb_core::fsutil::remove_dir_if_exists;
use corpusdb_core::traits::VectorIndex;
use corpusdb_core::types::{ChunkId, Component, SearchHit, SourceKind, VectorRecord};

use crate::schema::{records_to_batch, TABLE_NAME};

/// One LanceDB database per corpus under `root/<corpus>/`, holding a single
/// `chunks` table keyed by `chunk_id`.
pub struct LanceVectorIndex {
	root: PathBuf,
	dim: usize,
	overfetch: usize,
}

impl LanceVectorIndex {
	pub fn new(root: impl Into<PathBuf>, dim: usize) -> Self {
		Self { root: root.into(), dim, overfetch: 2 }
	}

	/// Ask LanceDB for `limit * overfetch` rows so distance ties at the cut are
	/// resolved by ordinal rather than by storage order.
	#[must_use]
	pub fn with_overfetch(mut self, overfetch: usize) -> Self {
		self.overfetch = overfetch.max(1);
		self
	}

	pub fn corpus_dir(&self, corpus: &str) -> PathBuf {
		self.root.join(corpus)
	}

	async fn connect(&self, corpus: &str) -> Result<Connection> {
		let dir = self.corpus_dir(corpus);
		Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
	}

	async fn open_existing(&self, corpus: &str) -> Result<Option<Table>> {
		if !self.corpus_dir(corpus).exists() {
			return Ok(None);
		}
		let conn = self.connect(corpus).await?;
		if !conn.table_names().execute().await?.iter().any(|n| n == TABLE_NAME) {
			return Ok(None);
		}
		Ok(Some(conn.open_table(TABLE_NAME).execute().await?))
	}

	fn dim_i32(&self) -> Result<i32> {
		i32::try_from(self.dim).map_err(|_| anyhow!("dimension {} out of range", self.dim))
	}

	async fn write(&self, corpus: &str, records: &[VectorRecord]) -> Result<usize> {
		if records.is_empty() {
			return Ok(0);
		}
		let dim = self.dim_i32()?;
		let batch = records_to_batch(records, dim)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		let conn = self.connect(corpus).await?;
		if conn.table_names().execute().await?.iter().any(|n| n == TABLE_NAME) {
			let table = conn.open_table(TABLE_NAME).execute().await?;
			// Upsert via merge_insert: chunk_id is unique
			let mut mi = table.merge_insert(&["chunk_id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
		} else {
			conn.create_table(TABLE_NAME, reader).execute().await?;
		}
		tracing::debug!(corpus, rows = records.len(), "upserted vectors");
		Ok(records.len())
	}

	async fn search(&self, corpus: &str, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		let table = self.open_existing(corpus).await?.ok_or_else(|| anyhow!("no vector index for corpus '{corpus}'"))?;
		let fetch = limit.saturating_mul(self.overfetch);
		let mut stream = table
			.vector_search(vector.to_vec())?
			.distance_type(DistanceType::Cosine)
			.select(Select::columns(&["chunk_id", "ordinal"]))
			.limit(fetch)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch.column_by_name("chunk_id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("missing chunk_id"))?;
			let ordinals = batch.column_by_name("ordinal").and_then(|c| c.as_any().downcast_ref::<Int64Array>()).ok_or_else(|| anyhow!("missing ordinal"))?;
			let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>()).ok_or_else(|| anyhow!("missing _distance"))?;
			for i in 0..batch.num_rows() {
				hits.push(SearchHit {
					id: ids.value(i).to_string(),
					score: 1.0 - distances.value(i),
					ordinal: u64::try_from(ordinals.value(i)).unwrap_or(u64::MAX),
					source: SourceKind::Vector,
				});
			}
		}
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.ordinal.cmp(&b.ordinal)));
		hits.truncate(limit);
		Ok(hits)
	}

	async fn ids(&self, corpus: &str) -> Result<Option<Vec<ChunkId>>> {
		let Some(table) = self.open_existing(corpus).await? else { return Ok(None) };
		let total = table.count_rows(None).await?;
		if total == 0 {
			return Ok(Some(Vec::new()));
		}
		// Plain queries carry a default limit; scan exactly the rows the table holds.
		let mut stream = table.query().select(Select::columns(&["chunk_id", "vector"])).limit(total).execute().await?;
		let mut ids = Vec::with_capacity(total);
		let mut scanned = 0usize;
		while let Some(batch) = stream.try_next().await? {
			scanned += batch.num_rows();
			let col = batch.column_by_name("chunk_id").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("missing chunk_id"))?;
			let vectors = batch.column_by_name("vector").ok_or_else(|| anyhow!("missing vector"))?;
			for i in 0..batch.num_rows() {
				// Rows without a vector are not indexed.
				if vectors.is_valid(i) {
					ids.push(col.value(i).to_string());
				}
			}
		}
		if scanned != total {
			return Err(anyhow!("scanned {scanned} of {total} rows"));
		}
		Ok(Some(ids))
	}
}

fn store_err(e: &anyhow::Error) -> Error {
	Error::VectorStore(format!("{e:#}"))
}

impl VectorIndex for LanceVectorIndex {
	fn upsert<'a>(&'a self, corpus: &'a str, records: &'a [VectorRecord]) -> BoxFuture<'a, corpusdb_core::Result<usize>> {
		Box::pin(async move {
			if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dim) {
				return Err(Error::InvalidConfig(format!("dim mismatch: got {} expected {}", bad.vector.len(), self.dim)));
			}
			self.write(corpus, records).await.map_err(|e| store_err(&e))
		})
	}

	fn query<'a>(&'a self, corpus: &'a str, vector: &'a [f32], limit: usize) -> BoxFuture<'a, corpusdb_core::Result<Vec<SearchHit>>> {
		Box::pin(async move { self.search(corpus, vector, limit).await.map_err(|e| store_err(&e)) })
	}

	fn chunk_ids<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, corpusdb_core::Result<Option<Vec<ChunkId>>>> {
		Box::pin(async move {
			self.ids(corpus)
				.await
				.map_err(|e| Error::corruption(corpus, Component::VectorIndex, format!("{e:#}")))
		})
	}

	fn drop_corpus<'a>(&'a self, corpus: &'a str) -> BoxFuture<'a, corpusdb_core::Result<()>> {
		Box::pin(async move {
			remove_dir_if_exists(&self.corpus_dir(corpus))?;
			tracing::debug!(corpus, "dropped vector index");
			Ok(())
		})
	}
}
