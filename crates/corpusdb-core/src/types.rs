//! Domain types shared by the registry, the indexes, the pipeline and the retriever.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A contiguous slice of a corpus source that is independently indexed.
///
/// - `chunk_id`: stable identifier derived from position and content
/// - `index`: position within the corpus chunk sequence (insertion order)
/// - `source_offset`: byte offset of the chunk start in the source text
/// - `context`: optional summary of the surrounding document, indexed with the text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub corpus_name: String,
    pub index: usize,
    pub source_offset: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Chunk {
    /// What both indexes see: the context summary prefixed to the text when there is one.
    pub fn indexed_text(&self) -> String {
        match self.context.as_deref() {
            Some(context) if !context.trim().is_empty() => format!("Context: {context}\n\nText: {}", self.text),
            _ => self.text.clone(),
        }
    }
}

/// One embedded chunk as written to the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub chunk_id: ChunkId,
    pub corpus_name: String,
    pub ordinal: u64,
    pub vector: Vec<f32>,
}

/// Indicates which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Keyword,
}

/// The minimal surface returned by both engines.
///
/// `id` matches `Chunk::chunk_id`. `score` is engine-specific but
/// higher is always better. `ordinal` is the chunk's insertion order and
/// breaks score ties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub ordinal: u64,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Txt,
    Pdf,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Txt => f.write_str("txt"),
            FileType::Pdf => f.write_str("pdf"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(FileType::Txt),
            "pdf" => Ok(FileType::Pdf),
            other => Err(format!("unsupported file type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub file_type: FileType,
}

/// Registry record for one corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusEntry {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub source: SourceSpec,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub chunk_count: usize,
    #[serde(default)]
    pub last_processed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl CorpusEntry {
    pub fn new(name: impl Into<String>, source: SourceSpec) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            source,
            is_active: true,
            chunk_count: 0,
            last_processed: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// The three per-corpus artifacts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Chunks,
    VectorIndex,
    KeywordIndex,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Chunks, Component::VectorIndex, Component::KeywordIndex];
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Chunks => f.write_str("chunks"),
            Component::VectorIndex => f.write_str("vector_index"),
            Component::KeywordIndex => f.write_str("keyword_index"),
        }
    }
}

/// Observed state of one artifact. Only `Present` counts as present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComponentState {
    Present,
    Missing,
    /// Holds a strict subset of the current chunk ids.
    Incomplete { indexed: usize, expected: usize },
    /// Holds ids that no longer exist in the chunk set.
    Stale { stale: usize },
    Corrupt { reason: String },
}

impl ComponentState {
    pub fn is_present(&self) -> bool {
        matches!(self, ComponentState::Present)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentState::Present => f.write_str("present"),
            ComponentState::Missing => f.write_str("missing"),
            ComponentState::Incomplete { indexed, expected } => write!(f, "incomplete ({indexed}/{expected})"),
            ComponentState::Stale { stale } => write!(f, "stale ({stale} unknown ids)"),
            ComponentState::Corrupt { reason } => write!(f, "corrupt ({reason})"),
        }
    }
}

/// Fresh snapshot of the three artifacts for one corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentStatus {
    pub chunks: ComponentState,
    pub vector_index: ComponentState,
    pub keyword_index: ComponentState,
    /// Number of chunks found on disk, 0 when the chunk file is absent or unreadable.
    pub chunk_count: usize,
}

impl ComponentStatus {
    pub fn missing_all() -> Self {
        Self {
            chunks: ComponentState::Missing,
            vector_index: ComponentState::Missing,
            keyword_index: ComponentState::Missing,
            chunk_count: 0,
        }
    }

    pub fn state(&self, component: Component) -> &ComponentState {
        match component {
            Component::Chunks => &self.chunks,
            Component::VectorIndex => &self.vector_index,
            Component::KeywordIndex => &self.keyword_index,
        }
    }

    pub fn is_complete(&self) -> bool {
        Component::ALL.iter().all(|c| self.state(*c).is_present())
    }

    pub fn needs_rebuild(&self) -> bool {
        !self.is_complete()
    }

    /// Components that are not `Present`, in canonical order.
    pub fn missing(&self) -> Vec<Component> {
        Component::ALL.into_iter().filter(|c| !self.state(*c).is_present()).collect()
    }
}

/// A fused retrieval hit with its text and per-engine ranks (1-based).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub fused_score: f64,
    pub vector_rank: Option<usize>,
    pub keyword_rank: Option<usize>,
}
