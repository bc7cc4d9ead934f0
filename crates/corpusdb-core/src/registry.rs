//! Durable corpus registry.
//!
//! The whole document is small and is rewritten atomically on every mutation.
//! Readers share a `tokio::sync::RwLock`; writers are serialized by it and
//! persist before publishing the new state, so a failed write leaves both the
//! file and the in-memory view untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::resolve_with_base;
use crate::error::{Error, Result};
use crate::fsutil::write_atomic;
use crate::traits::ArtifactProbe;
use crate::types::{ComponentStatus, CorpusEntry, FileType, SourceSpec};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    corpuses: Vec<CorpusEntry>,
}

pub struct CorpusRegistry {
    path: PathBuf,
    entries: RwLock<Vec<CorpusEntry>>,
    probe: Arc<dyn ArtifactProbe>,
}

impl CorpusRegistry {
    /// Open the registry at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, probe: Arc<dyn ArtifactProbe>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let doc: RegistryDocument = serde_json::from_str(&raw).map_err(|e| {
                    Error::InvalidConfig(format!("registry {} is unreadable: {e}", path.display()))
                })?;
                doc.corpuses
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), corpuses = entries.len(), "opened registry");
        Ok(Self { path, entries: RwLock::new(entries), probe })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, name: &str) -> Result<CorpusEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("corpus '{name}'")))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.iter().any(|e| e.name == name)
    }

    /// All entries in insertion order.
    pub async fn list(&self) -> Vec<CorpusEntry> {
        self.entries.read().await.clone()
    }

    pub async fn list_active(&self) -> Vec<CorpusEntry> {
        self.entries.read().await.iter().filter(|e| e.is_active).cloned().collect()
    }

    /// Create or replace by name. Replacing keeps the entry's position.
    pub async fn upsert(&self, entry: CorpusEntry) -> Result<()> {
        validate_entry(&entry)?;
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        match next.iter_mut().find(|e| e.name == entry.name) {
            Some(slot) => *slot = entry,
            None => next.push(entry),
        }
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    /// Insert a new entry; an existing name is rejected.
    pub async fn register(&self, entry: CorpusEntry) -> Result<()> {
        validate_entry(&entry)?;
        let mut guard = self.entries.write().await;
        if guard.iter().any(|e| e.name == entry.name) {
            return Err(Error::Validation(format!("corpus '{}' already exists", entry.name)));
        }
        let mut next = guard.clone();
        tracing::info!(corpus = %entry.name, "registered corpus");
        next.push(entry);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    /// Apply `f` to the named entry under the write lock and persist the result.
    pub async fn update<F>(&self, name: &str, f: F) -> Result<CorpusEntry>
    where
        F: FnOnce(&mut CorpusEntry),
    {
        let mut guard = self.entries.write().await;
        let mut next = guard.clone();
        let slot = next
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::NotFound(format!("corpus '{name}'")))?;
        f(slot);
        if slot.name != name {
            return Err(Error::Validation("corpus name is immutable".into()));
        }
        validate_entry(slot)?;
        let updated = slot.clone();
        self.persist(&next)?;
        *guard = next;
        Ok(updated)
    }

    pub async fn set_active(&self, name: &str, active: bool) -> Result<CorpusEntry> {
        let entry = self.update(name, |e| e.is_active = active).await?;
        tracing::info!(corpus = name, active, "changed corpus activity");
        Ok(entry)
    }

    /// Remove the entry. Returns whether it existed; absent names are a no-op.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let mut guard = self.entries.write().await;
        if !guard.iter().any(|e| e.name == name) {
            return Ok(false);
        }
        let next: Vec<CorpusEntry> = guard.iter().filter(|e| e.name != name).cloned().collect();
        self.persist(&next)?;
        *guard = next;
        tracing::info!(corpus = name, "removed registry entry");
        Ok(true)
    }

    /// Inspect the artifact stores for `name`. Never cached.
    pub async fn compute_status(&self, name: &str) -> Result<ComponentStatus> {
        if !self.contains(name).await {
            return Err(Error::NotFound(format!("corpus '{name}'")));
        }
        Ok(self.probe.probe(name).await)
    }

    /// Register or refresh entries from a TOML jobs file:
    ///
    /// ```toml
    /// [corpuses.aesop]
    /// display_name = "Aesop's Fables"
    /// source = "raw/aesop.txt"
    /// ```
    ///
    /// Relative sources resolve against the jobs file directory. Existing entries keep
    /// their build bookkeeping; inactive jobs are skipped. Returns the names touched.
    pub async fn load_jobs(&self, path: &Path) -> Result<Vec<String>> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("jobs file {}", path.display())));
        }
        let jobs: JobsFile = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| Error::InvalidConfig(format!("jobs file {}: {e}", path.display())))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut loaded = Vec::new();
        for (name, job) in jobs.corpuses {
            if !job.is_active {
                tracing::info!(corpus = %name, "skipping inactive job");
                continue;
            }
            let source = SourceSpec { path: resolve_with_base(base, &job.source), file_type: job.file_type };
            let mut entry = CorpusEntry::new(name.clone(), source)
                .with_description(job.description.unwrap_or_default());
            if let Some(display_name) = job.display_name {
                entry = entry.with_display_name(display_name);
            }
            if let Ok(existing) = self.get(&name).await {
                entry.created_at = existing.created_at;
                entry.last_processed = existing.last_processed;
                entry.chunk_count = existing.chunk_count;
                entry.is_active = existing.is_active;
            }
            self.upsert(entry).await?;
            loaded.push(name);
        }
        tracing::info!(count = loaded.len(), path = %path.display(), "loaded jobs");
        Ok(loaded)
    }

    fn persist(&self, entries: &[CorpusEntry]) -> Result<()> {
        let doc = RegistryDocument { corpuses: entries.to_vec() };
        let bytes = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.path, &bytes)
    }
}

#[derive(Debug, Deserialize)]
struct JobsFile {
    #[serde(default)]
    corpuses: BTreeMap<String, JobSpec>,
}

#[derive(Debug, Deserialize)]
struct JobSpec {
    display_name: Option<String>,
    description: Option<String>,
    source: String,
    #[serde(default)]
    file_type: FileType,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Corpus names double as directory names: lowercase ascii letters, digits, `-` and `_`,
/// starting with a letter or digit, at most 64 bytes.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Validation("corpus name must not be empty".into()));
    }
    if name.len() > 64 {
        return Err(Error::Validation(format!("corpus name '{name}' is longer than 64 characters")));
    }
    let first_ok = name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    let rest_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !first_ok || !rest_ok {
        return Err(Error::Validation(format!(
            "corpus name '{name}' may only contain a-z, 0-9, '-' and '_' and must start with a letter or digit"
        )));
    }
    Ok(())
}

fn validate_entry(entry: &CorpusEntry) -> Result<()> {
    validate_name(&entry.name)?;
    if entry.source.path.as_os_str().is_empty() {
        return Err(Error::Validation(format!("corpus '{}' has an empty source path", entry.name)));
    }
    Ok(())
}
