use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

use corpusdb_core::types::VectorRecord;

pub const TABLE_NAME: &str = "chunks";

pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("chunk_id", DataType::Utf8, false),
		Field::new("corpus_name", DataType::Utf8, false),
		Field::new("ordinal", DataType::Int64, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn records_to_batch(records: &[VectorRecord], dim: i32) -> anyhow::Result<RecordBatch> {
	let mut ids = Vec::with_capacity(records.len());
	let mut corpora = Vec::with_capacity(records.len());
	let mut ordinals = Vec::with_capacity(records.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(records.len());
	for r in records {
		ids.push(r.chunk_id.clone());
		corpora.push(r.corpus_name.clone());
		ordinals.push(i64::try_from(r.ordinal).unwrap_or(i64::MAX));
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(corpora)),
		Arc::new(Int64Array::from(ordinals)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	])?;
	Ok(batch)
}
