use clap::Parser;
use tempfile::TempDir;

use corpusdb_cli::{run, App, Cli};
use corpusdb_core::config::{EmbeddingProviderKind, Settings};
use corpusdb_core::{Component, Error, Unavailability};
use corpusdb_ingest::IngestAction;

const FABLE: &str = "A wise old man lived at the edge of the forest.\n\n\
The fox asked the crow for a song.\n\n\
The tortoise won the race against the hare.\n";

fn settings(tmp: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.data.root = tmp.path().join("data").to_string_lossy().into_owned();
    settings.embedding.provider = EmbeddingProviderKind::Hash;
    settings.embedding.dim = 64;
    settings.ingest.backoff_ms = 1;
    settings
}

async fn cli(app: &App, args: &[&str]) -> bool {
    let parsed = Cli::try_parse_from(std::iter::once("corpusdb").chain(args.iter().copied())).unwrap();
    run(app, parsed.command, parsed.json).await.unwrap()
}

#[tokio::test]
async fn register_ingest_retrieve_and_recover() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("fable.txt");
    std::fs::write(&source, FABLE).unwrap();
    let app = App::from_settings(settings(&tmp)).unwrap();

    assert!(cli(&app, &["register", "fable", source.to_str().unwrap(), "--display-name", "Fables"]).await);

    let err = app.retriever.retrieve("fable", "wise old man", 2, false).await.unwrap_err();
    match err {
        Error::CorpusUnavailable { reason: Unavailability::Incomplete { missing }, .. } => {
            assert_eq!(missing, Component::ALL.to_vec());
        }
        other => panic!("unexpected {other}"),
    }

    assert!(cli(&app, &["ingest", "--corpus", "fable"]).await);
    let status = app.registry.compute_status("fable").await.unwrap();
    assert!(status.is_complete(), "{status:?}");
    assert_eq!(app.registry.get("fable").await.unwrap().chunk_count, 3);

    let results = app.retriever.retrieve("fable", "wise old man", 2, false).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].text.contains("wise old man"));
    assert_eq!((results[0].vector_rank, results[0].keyword_rank), (Some(1), Some(1)));
    assert_eq!(results[1].keyword_rank, None);
    assert!(results[0].fused_score > results[1].fused_score);

    let again = app.pipeline.ingest("fable", false).await.unwrap();
    assert_eq!(again.action, IngestAction::NoOp);

    std::fs::remove_dir_all(app.root.join("keyword").join("fable")).unwrap();
    assert!(matches!(
        app.retriever.retrieve("fable", "wise", 2, false).await,
        Err(Error::CorpusUnavailable { .. })
    ));
    assert_eq!(app.pipeline.dry_run("fable", false).await.unwrap(), IngestAction::RebuildKeyword);
    let rebuilt = app.pipeline.ingest("fable", false).await.unwrap();
    assert_eq!(rebuilt.action, IngestAction::RebuildKeyword);
    assert_eq!(rebuilt.vectors_upserted, 0);
    assert!(rebuilt.complete);

    assert!(cli(&app, &["--json", "status"]).await);
    assert!(cli(&app, &["retrieve", "fable", "tortoise", "-k", "1", "--seed", "7"]).await);
}

#[tokio::test]
async fn settings_survive_a_reopen() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("fable.txt");
    std::fs::write(&source, FABLE).unwrap();
    {
        let app = App::from_settings(settings(&tmp)).unwrap();
        assert!(cli(&app, &["register", "fable", source.to_str().unwrap()]).await);
        assert!(cli(&app, &["ingest"]).await);
    }

    let app = App::from_settings(settings(&tmp)).unwrap();
    assert!(app.registry.compute_status("fable").await.unwrap().is_complete());
    let results = app.retriever.retrieve("fable", "fox crow song", 1, false).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].text.contains("fox"));
}

#[tokio::test]
async fn delete_and_deactivate_through_the_cli() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("fable.txt");
    std::fs::write(&source, FABLE).unwrap();
    let app = App::from_settings(settings(&tmp)).unwrap();
    assert!(cli(&app, &["register", "fable", source.to_str().unwrap()]).await);
    assert!(cli(&app, &["ingest"]).await);

    assert!(cli(&app, &["deactivate", "fable"]).await);
    assert!(app.retriever.list_active_corpuses().await.is_empty());
    assert!(matches!(
        app.retriever.retrieve("fable", "fox", 1, false).await,
        Err(Error::CorpusUnavailable { reason: Unavailability::Inactive, .. })
    ));

    assert!(cli(&app, &["delete", "fable"]).await);
    assert!(!app.registry.contains("fable").await);
    assert!(!app.root.join("chunks").join("fable").exists());
    assert!(!app.root.join("vectors").join("fable").exists());
    assert!(!app.root.join("keyword").join("fable").exists());
}

#[tokio::test]
async fn failing_corpus_makes_ingest_report_failure() {
    let tmp = TempDir::new().unwrap();
    let good = tmp.path().join("good.txt");
    std::fs::write(&good, FABLE).unwrap();
    let app = App::from_settings(settings(&tmp)).unwrap();
    assert!(cli(&app, &["register", "good", good.to_str().unwrap()]).await);
    assert!(cli(&app, &["register", "gone", tmp.path().join("missing.txt").to_str().unwrap()]).await);

    assert!(!cli(&app, &["ingest"]).await);
    assert!(app.registry.compute_status("good").await.unwrap().is_complete());
    assert!(!app.registry.compute_status("gone").await.unwrap().is_complete());
}

#[tokio::test]
async fn corpora_larger_than_one_query_page_stay_complete() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("almanac.txt");
    let paragraphs: Vec<String> =
        (1..=25).map(|i| format!("Entry {i}: the farmer planted row {i} before the rain.")).collect();
    std::fs::write(&source, paragraphs.join("\n\n")).unwrap();
    let app = App::from_settings(settings(&tmp)).unwrap();

    assert!(cli(&app, &["register", "almanac", source.to_str().unwrap()]).await);
    assert!(cli(&app, &["ingest", "--corpus", "almanac"]).await);

    let status = app.registry.compute_status("almanac").await.unwrap();
    assert!(status.is_complete(), "{status:?}");
    assert_eq!(status.chunk_count, 25);
    assert_eq!(app.pipeline.ingest("almanac", false).await.unwrap().action, IngestAction::NoOp);

    let results = app.retriever.retrieve("almanac", "17", 3, false).await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].text.contains("row 17 "));
    assert_eq!(results[0].keyword_rank, Some(1));
}

#[tokio::test]
async fn concat_builds_one_source_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("parts");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("b.txt"), "second part").unwrap();
    std::fs::write(dir.join("a.txt"), "first part").unwrap();
    let out = tmp.path().join("joined.txt");
    let app = App::from_settings(settings(&tmp)).unwrap();

    assert!(cli(&app, &["concat", dir.to_str().unwrap(), out.to_str().unwrap()]).await);
    let joined = std::fs::read_to_string(&out).unwrap();
    assert!(joined.find("first part").unwrap() < joined.find("second part").unwrap());
}
