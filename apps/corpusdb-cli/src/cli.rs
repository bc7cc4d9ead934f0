use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use corpusdb_core::source::concat_directory;
use corpusdb_core::types::{CorpusEntry, FileType, SourceSpec};
use corpusdb_hybrid::CandidateSelection;

use crate::app::App;
use crate::output;

/// Corpus ingestion and hybrid retrieval.
#[derive(Parser, Debug)]
#[command(name = "corpusdb", version, about)]
pub struct Cli {
    /// Path to the base config file; `config.<RUST_ENV>.toml` is read from the same directory
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a new corpus
    Register {
        name: String,
        /// Raw source file
        source: PathBuf,
        #[arg(long, default_value = "txt")]
        file_type: FileType,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Register without making it retrievable
        #[arg(long)]
        inactive: bool,
    },
    /// Register or refresh corpora from a TOML jobs file
    LoadJobs { path: PathBuf },
    /// Build whatever each corpus is missing
    Ingest {
        /// Only this corpus (default: every active corpus)
        #[arg(long)]
        corpus: Option<String>,
        /// Re-chunk and rebuild both indexes even when complete
        #[arg(long)]
        force_rebuild: bool,
        /// Show the planned action without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Fresh component status for every registered corpus
    Status,
    /// Remove a corpus and all of its artifacts
    Delete { name: String },
    Activate { name: String },
    Deactivate { name: String },
    /// Concatenate every file with an extension in a directory into one source file
    Concat {
        dir: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "txt")]
        ext: String,
    },
    /// Hybrid search over one corpus
    Retrieve {
        corpus: String,
        query: String,
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
        /// Sample candidates by weight instead of taking the top ranks
        #[arg(long)]
        randomize: bool,
        /// Seed for reproducible sampling; implies --randomize
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Active corpora available for retrieval
    List,
}

/// Run one command. `Ok(false)` means at least one corpus failed and the
/// failure has already been printed.
pub async fn run(app: &App, command: Command, json: bool) -> Result<bool> {
    match command {
        Command::Register { name, source, file_type, display_name, description, inactive } => {
            let mut entry = CorpusEntry::new(name, SourceSpec { path: source, file_type });
            if let Some(display_name) = display_name {
                entry = entry.with_display_name(display_name);
            }
            if let Some(description) = description {
                entry = entry.with_description(description);
            }
            if inactive {
                entry = entry.inactive();
            }
            app.registry.register(entry.clone()).await?;
            if json {
                println!("{}", output::format_json(&entry));
            } else {
                println!("Registered {} ({})", entry.name, entry.source.path.display());
            }
            Ok(true)
        }
        Command::LoadJobs { path } => {
            let names = app.registry.load_jobs(&path).await?;
            if json {
                println!("{}", output::format_json(&names));
            } else {
                println!("Loaded {} job(s): {}", names.len(), names.join(", "));
            }
            Ok(true)
        }
        Command::Ingest { corpus, force_rebuild, dry_run } => {
            if dry_run {
                return plan(app, corpus, force_rebuild, json).await;
            }
            let outcomes = match corpus {
                Some(name) => {
                    let result = app.pipeline.ingest(&name, force_rebuild).await;
                    vec![corpusdb_ingest::CorpusOutcome { corpus: name, result }]
                }
                None => app.pipeline.ingest_all(force_rebuild).await,
            };
            if json {
                let rows: Vec<output::JsonOutcome<'_>> = outcomes.iter().map(Into::into).collect();
                println!("{}", output::format_json(&rows));
            } else {
                println!("{}", output::format_outcomes(&outcomes));
            }
            Ok(outcomes.iter().all(corpusdb_ingest::CorpusOutcome::is_complete))
        }
        Command::Status => {
            let entries = app.pipeline.status_report().await;
            if json {
                println!("{}", output::format_json(&entries));
            } else {
                println!("{}", output::format_status(&entries));
            }
            Ok(true)
        }
        Command::Delete { name } => {
            let report = app.pipeline.delete_corpus(&name).await?;
            if json {
                println!("{}", output::format_json(&report));
            } else {
                println!("{}", output::format_deletion(&report));
            }
            Ok(report.is_complete())
        }
        Command::Activate { name } => set_active(app, &name, true, json).await,
        Command::Deactivate { name } => set_active(app, &name, false, json).await,
        Command::Concat { dir, output: target, ext } => {
            let count = concat_directory(&dir, &ext, &target)?;
            if count == 0 {
                bail!("no .{ext} files under {}", dir.display());
            }
            if !json {
                println!("Concatenated {count} file(s) into {}", target.display());
            } else {
                println!("{}", output::format_json(&serde_json::json!({ "files": count, "output": target })));
            }
            Ok(true)
        }
        Command::Retrieve { corpus, query, top_k, randomize, seed } => {
            let selection = if randomize || seed.is_some() {
                CandidateSelection::WeightedSample { pool_factor: app.settings.retrieval.random_pool_factor, seed }
            } else {
                CandidateSelection::TopN
            };
            let results = app.retriever.retrieve_with(&corpus, &query, top_k, &selection).await?;
            if json {
                println!("{}", output::format_json(&results));
            } else {
                println!("{}", output::format_results(&query, &results));
            }
            Ok(true)
        }
        Command::List => {
            let entries = app.retriever.list_active_corpuses().await;
            if json {
                println!("{}", output::format_json(&entries));
            } else {
                println!("{}", output::format_corpora(&entries));
            }
            Ok(true)
        }
    }
}

async fn plan(app: &App, corpus: Option<String>, force_rebuild: bool, json: bool) -> Result<bool> {
    let names = match corpus {
        Some(name) => vec![name],
        None => app.registry.list_active().await.into_iter().map(|e| e.name).collect(),
    };
    let mut plans = Vec::with_capacity(names.len());
    for name in names {
        let action = app.pipeline.dry_run(&name, force_rebuild).await?;
        plans.push((name, action));
    }
    if json {
        let rows: Vec<serde_json::Value> = plans
            .iter()
            .map(|(name, action)| serde_json::json!({ "corpus": name, "plan": action }))
            .collect();
        println!("{}", output::format_json(&rows));
    } else {
        println!("{}", output::format_plan(&plans));
    }
    Ok(true)
}

async fn set_active(app: &App, name: &str, active: bool, json: bool) -> Result<bool> {
    let entry = app.registry.set_active(name, active).await?;
    if json {
        println!("{}", output::format_json(&entry));
    } else {
        println!("{} is now {}", entry.name, if entry.is_active { "active" } else { "inactive" });
    }
    Ok(true)
}
