//! Terminal rendering. `--json` prints the serialized reports instead.

use std::fmt::Write as _;

use serde::Serialize;

use corpusdb_core::types::{CorpusEntry, RetrievalResult};
use corpusdb_ingest::{CorpusOutcome, DeletionReport, IngestAction, IngestionReport, StatusEntry};

const SNIPPET_MAX_LEN: usize = 160;

pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// JSON shape of one ingest outcome.
#[derive(Serialize)]
pub struct JsonOutcome<'a> {
    pub corpus: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a IngestionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<'a> From<&'a CorpusOutcome> for JsonOutcome<'a> {
    fn from(outcome: &'a CorpusOutcome) -> Self {
        Self {
            corpus: &outcome.corpus,
            ok: outcome.is_ok(),
            report: outcome.result.as_ref().ok(),
            error: outcome.result.as_ref().err().map(ToString::to_string),
        }
    }
}

pub fn format_outcomes(outcomes: &[CorpusOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let _ = writeln!(out, "{}", format_report(report));
            }
            Err(e) => {
                let _ = writeln!(out, "FAILED {}: {e}", outcome.corpus);
            }
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_complete()).count();
    let _ = write!(out, "{} corpus(es), {} failed", outcomes.len(), failed);
    out
}

pub fn format_report(report: &IngestionReport) -> String {
    let mut line = format!(
        "{} {}: {} ({} chunks written, {} vectors upserted, {} reused",
        if report.complete { "OK" } else { "INCOMPLETE" },
        report.corpus,
        report.action,
        report.chunks_written,
        report.vectors_upserted,
        report.vectors_skipped,
    );
    if !report.retries.is_empty() {
        let _ = write!(line, ", {} retries", report.retries.len());
    }
    let _ = write!(line, ", {} ms)", report.elapsed_ms);
    line
}

pub fn format_plan(plans: &[(String, IngestAction)]) -> String {
    plans.iter().map(|(name, action)| format!("{name}: would {action}")).collect::<Vec<_>>().join("\n")
}

pub fn format_status(entries: &[StatusEntry]) -> String {
    if entries.is_empty() {
        return "No corpora registered.".to_string();
    }
    let mut out = String::new();
    for e in entries {
        let state = if e.complete { "complete".to_string() } else { format!("missing {}", join(&e.missing_components)) };
        let _ = writeln!(
            out,
            "{:<24} {:<8} {:>6} chunks  {}  last processed: {}",
            e.name,
            if e.is_active { "active" } else { "inactive" },
            e.chunk_count,
            state,
            e.last_processed.map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
        );
        if let Some(status) = &e.status {
            if !e.complete {
                let _ = writeln!(
                    out,
                    "    chunks: {}, vector_index: {}, keyword_index: {}",
                    status.chunks, status.vector_index, status.keyword_index
                );
            }
        }
        if let Some(error) = &e.error {
            let _ = writeln!(out, "    error: {error}");
        }
    }
    out.trim_end().to_string()
}

pub fn format_deletion(report: &DeletionReport) -> String {
    let mut out = format!("{}: removed {}", report.corpus, join(&report.removed));
    for failure in &report.failures {
        let _ = write!(out, "\n    failed to remove {}: {}", failure.component, failure.error);
    }
    if !report.entry_removed {
        out.push_str("\n    registry entry kept; re-run delete once the failures are fixed");
    }
    out
}

pub fn format_corpora(entries: &[CorpusEntry]) -> String {
    if entries.is_empty() {
        return "No active corpora.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            if e.description.is_empty() {
                format!("{}  {}", e.name, e.display_name)
            } else {
                format!("{}  {}: {}", e.name, e.display_name, e.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_results(query: &str, results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return format!("No results for \"{query}\".");
    }
    let mut out = format!("Results for \"{query}\":\n");
    for (i, r) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. [{}] score {:.5}  vector rank {}  keyword rank {}",
            i + 1,
            r.chunk_id,
            r.fused_score,
            rank(r.vector_rank),
            rank(r.keyword_rank),
        );
        if let Some(context) = &r.context {
            let _ = writeln!(out, "    context: {}", truncate_text(context, SNIPPET_MAX_LEN));
        }
        let _ = writeln!(out, "    {}", truncate_text(&r.text, SNIPPET_MAX_LEN));
    }
    out.trim_end().to_string()
}

fn rank(rank: Option<usize>) -> String {
    rank.map_or_else(|| "-".to_string(), |r| r.to_string())
}

fn join<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        return "nothing".to_string();
    }
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Collapse whitespace and cut at a char boundary.
fn truncate_text(text: &str, max_len: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_len {
        return flat;
    }
    let cut: String = flat.chars().take(max_len).collect();
    format!("{}...", cut.trim_end())
}
