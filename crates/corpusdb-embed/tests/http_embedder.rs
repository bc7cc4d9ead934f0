use std::time::Duration;

use tokio::net::TcpListener;

use corpusdb_core::traits::EmbeddingClient;
use corpusdb_core::Error;
use corpusdb_embed::HttpEmbedder;

mod common;
use common::{json_response, spawn_mock_server};

#[tokio::test]
async fn batch_results_are_reordered_by_index() {
    let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
    let (port, handle) = spawn_mock_server(vec![json_response("200 OK", body)]).await;
    let embedder =
        HttpEmbedder::new(format!("http://127.0.0.1:{port}/v1/"), "tiny", Some("k".into()), 2, Duration::from_secs(5)).unwrap();

    let texts = vec!["first".to_string(), "second".to_string()];
    let vectors = embedder.embed_batch(&texts).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let bodies = handle.await.unwrap();
    assert!(bodies[0].contains("\"model\":\"tiny\""));
    assert!(bodies[0].contains("\"input\":[\"first\",\"second\"]"));
}

#[tokio::test]
async fn server_errors_are_transient_and_client_errors_are_not() {
    let (port, _handle) = spawn_mock_server(vec![
        json_response("503 Service Unavailable", "{}"),
        json_response("401 Unauthorized", "{}"),
    ])
    .await;
    let embedder = HttpEmbedder::new(format!("http://127.0.0.1:{port}"), "m", None, 2, Duration::from_secs(5)).unwrap();

    let err = embedder.embed("x").await.unwrap_err();
    assert!(err.is_transient(), "{err}");
    let err = embedder.embed("x").await.unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0,0.0]}]}"#;
    let (port, _handle) = spawn_mock_server(vec![json_response("200 OK", body)]).await;
    let embedder = HttpEmbedder::new(format!("http://127.0.0.1:{port}"), "m", None, 2, Duration::from_secs(5)).unwrap();
    assert!(matches!(embedder.embed("x").await, Err(Error::InvalidConfig(_))));
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _hold = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    let embedder = HttpEmbedder::new(format!("http://127.0.0.1:{port}"), "m", None, 2, Duration::from_millis(200)).unwrap();
    let err = embedder.embed("x").await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err}");
}
