use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tempfile::TempDir;

use corpusdb_core::registry::CorpusRegistry;
use corpusdb_core::traits::ArtifactProbe;
use corpusdb_core::{ComponentState, ComponentStatus, CorpusEntry, Error, FileType, SourceSpec};

/// Counts probes so tests can check status is never cached.
#[derive(Default)]
struct CountingProbe {
    calls: AtomicUsize,
}

impl ArtifactProbe for CountingProbe {
    fn probe<'a>(&'a self, _corpus: &'a str) -> BoxFuture<'a, ComponentStatus> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut status = ComponentStatus::missing_all();
            if n > 0 {
                status.chunks = ComponentState::Present;
            }
            status
        })
    }
}

fn entry(name: &str) -> CorpusEntry {
    CorpusEntry::new(name, SourceSpec { path: format!("/src/{name}.txt").into(), file_type: FileType::Txt })
}

fn open(tmp: &TempDir) -> CorpusRegistry {
    CorpusRegistry::open(tmp.path().join("registry.json"), Arc::new(CountingProbe::default())).unwrap()
}

#[tokio::test]
async fn upsert_persists_and_reloads_in_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    registry.upsert(entry("zeta")).await.unwrap();
    registry.upsert(entry("alpha")).await.unwrap();
    registry.upsert(entry("zeta").with_display_name("Zeta Tales")).await.unwrap();

    let reopened = open(&tmp);
    let names: Vec<String> = reopened.list().await.into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["zeta", "alpha"]);
    assert_eq!(reopened.get("zeta").await.unwrap().display_name, "Zeta Tales");

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(tmp.path().join("registry.json")).unwrap()).unwrap();
    assert_eq!(raw["corpuses"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn invalid_names_fail_before_any_write() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    let err = registry.upsert(entry("Bad Name")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!tmp.path().join("registry.json").exists());
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    registry.register(entry("aesop")).await.unwrap();
    assert!(matches!(registry.register(entry("aesop")).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    registry.upsert(entry("aesop")).await.unwrap();
    assert!(registry.delete("aesop").await.unwrap());
    assert!(!registry.delete("aesop").await.unwrap());
    assert!(matches!(registry.get("aesop").await, Err(Error::NotFound(_))));
    assert!(open(&tmp).list().await.is_empty());
}

#[tokio::test]
async fn set_active_filters_list_active() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    registry.upsert(entry("a")).await.unwrap();
    registry.upsert(entry("b")).await.unwrap();
    registry.set_active("a", false).await.unwrap();
    let active: Vec<String> = registry.list_active().await.into_iter().map(|e| e.name).collect();
    assert_eq!(active, vec!["b"]);
    assert!(matches!(registry.set_active("nope", true).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn compute_status_probes_every_time() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    registry.upsert(entry("aesop")).await.unwrap();
    let first = registry.compute_status("aesop").await.unwrap();
    let second = registry.compute_status("aesop").await.unwrap();
    assert_eq!(first.chunks, ComponentState::Missing);
    assert_eq!(second.chunks, ComponentState::Present);
    assert!(matches!(registry.compute_status("ghost").await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn concurrent_writers_do_not_lose_entries() {
    let tmp = TempDir::new().unwrap();
    let registry = Arc::new(open(&tmp));
    let mut handles = Vec::new();
    for i in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move { registry.upsert(entry(&format!("c{i}"))).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(registry.list().await.len(), 16);
    assert_eq!(open(&tmp).list().await.len(), 16);
}

#[tokio::test]
async fn load_jobs_keeps_build_bookkeeping() {
    let tmp = TempDir::new().unwrap();
    let registry = open(&tmp);
    let mut existing = entry("aesop");
    existing.chunk_count = 42;
    existing.last_processed = Some(chrono::Utc::now());
    let created_at = existing.created_at;
    registry.upsert(existing).await.unwrap();

    let jobs = tmp.path().join("jobs.toml");
    std::fs::write(
        &jobs,
        r#"
[corpuses.aesop]
display_name = "Aesop's Fables"
source = "raw/aesop.txt"

[corpuses.grimm]
source = "/abs/grimm.pdf"
file_type = "pdf"

[corpuses.draft]
source = "draft.txt"
is_active = false
"#,
    )
    .unwrap();

    let loaded = registry.load_jobs(&jobs).await.unwrap();
    assert_eq!(loaded, vec!["aesop", "grimm"]);

    let aesop = registry.get("aesop").await.unwrap();
    assert_eq!(aesop.display_name, "Aesop's Fables");
    assert_eq!(aesop.chunk_count, 42);
    assert!(aesop.last_processed.is_some());
    assert_eq!(aesop.created_at, created_at);
    assert_eq!(aesop.source.path, tmp.path().join("raw/aesop.txt"));

    let grimm = registry.get("grimm").await.unwrap();
    assert_eq!(grimm.source.file_type, FileType::Pdf);
    assert!(!registry.contains("draft").await);
}
