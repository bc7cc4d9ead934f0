//! On-disk chunk sets, one JSON-lines file per corpus.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fsutil::{remove_dir_if_exists, write_atomic};
use crate::types::{Chunk, Component};

const CHUNK_FILE: &str = "chunks.jsonl";

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// `root` is the `chunks/` directory under the data root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn corpus_dir(&self, corpus: &str) -> PathBuf {
        self.root.join(corpus)
    }

    pub fn path(&self, corpus: &str) -> PathBuf {
        self.corpus_dir(corpus).join(CHUNK_FILE)
    }

    /// Replace the corpus chunk set in one atomic rename.
    pub fn write(&self, corpus: &str, chunks: &[Chunk]) -> Result<()> {
        let mut buf = Vec::with_capacity(chunks.len() * 256);
        for chunk in chunks {
            serde_json::to_writer(&mut buf, chunk)?;
            buf.push(b'\n');
        }
        write_atomic(&self.path(corpus), &buf)?;
        tracing::debug!(corpus, count = chunks.len(), "wrote chunk set");
        Ok(())
    }

    /// `Ok(None)` when the corpus has no chunk file; unreadable files are corruption.
    pub fn load(&self, corpus: &str) -> Result<Option<Vec<Chunk>>> {
        let path = self.path(corpus);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::corruption(corpus, Component::Chunks, e)),
        };
        let mut chunks = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(line)
                .map_err(|e| Error::corruption(corpus, Component::Chunks, format!("line {}: {e}", lineno + 1)))?;
            if chunk.corpus_name != corpus {
                return Err(Error::corruption(
                    corpus,
                    Component::Chunks,
                    format!("line {} belongs to corpus '{}'", lineno + 1, chunk.corpus_name),
                ));
            }
            chunks.push(chunk);
        }
        Ok(Some(chunks))
    }

    pub fn remove(&self, corpus: &str) -> Result<()> {
        remove_dir_if_exists(&self.corpus_dir(corpus))
    }
}
