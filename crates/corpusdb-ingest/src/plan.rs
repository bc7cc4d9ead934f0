use std::fmt;

use serde::Serialize;

use corpusdb_core::types::{ComponentState, ComponentStatus};

/// The subset of build work a corpus needs, derived from its component status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IngestAction {
    /// Re-chunk the source, then embed everything and build the keyword index.
    FullRebuild,
    /// Embed chunks the vector index lacks. `reset_vectors` drops the index first
    /// when it holds unknown ids or cannot be read.
    Reembed { reset_vectors: bool, rebuild_keyword: bool },
    RebuildKeyword,
    NoOp,
}

impl fmt::Display for IngestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestAction::FullRebuild => f.write_str("full rebuild"),
            IngestAction::Reembed { reset_vectors, rebuild_keyword } => {
                f.write_str(if *reset_vectors { "reset and re-embed" } else { "resume embedding" })?;
                if *rebuild_keyword {
                    f.write_str(" + rebuild keyword index")?;
                }
                Ok(())
            }
            IngestAction::RebuildKeyword => f.write_str("rebuild keyword index"),
            IngestAction::NoOp => f.write_str("up to date"),
        }
    }
}

pub fn plan(status: &ComponentStatus, force_rebuild: bool) -> IngestAction {
    if force_rebuild || !status.chunks.is_present() {
        return IngestAction::FullRebuild;
    }
    let rebuild_keyword = !status.keyword_index.is_present();
    match &status.vector_index {
        ComponentState::Present if rebuild_keyword => IngestAction::RebuildKeyword,
        ComponentState::Present => IngestAction::NoOp,
        ComponentState::Missing | ComponentState::Incomplete { .. } => {
            IngestAction::Reembed { reset_vectors: false, rebuild_keyword }
        }
        ComponentState::Stale { .. } | ComponentState::Corrupt { .. } => {
            IngestAction::Reembed { reset_vectors: true, rebuild_keyword }
        }
    }
}
