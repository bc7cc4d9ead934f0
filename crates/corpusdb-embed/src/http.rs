use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use corpusdb_core::config::EmbeddingSettings;
use corpusdb_core::error::{Error, Result};
use corpusdb_core::traits::EmbeddingClient;

/// Client for an OpenAI-compatible `POST {base_url}/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    model_id: String,
    api_key: Option<String>,
    dim: usize,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dim: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        Ok(Self { client, model_id: format!("openai:{model}:d{dim}"), base_url, model, api_key, dim, timeout })
    }

    /// The API key is read from the env var named by `api_key_env`; a missing key is
    /// allowed for local servers that do not check it.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(var = %settings.api_key_env, "no embedding API key set");
        }
        Self::new(
            settings.base_url.clone(),
            settings.model.clone(),
            api_key,
            settings.dim,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model: &self.model, input: texts };
        let mut req = self.client.post(format!("{}/embeddings", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let response = req.send().await.map_err(|e| self.map_http(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_http(&e))?;

        if !status.is_success() {
            tracing::error!("embedding API error {status}: {text}");
            // Rate limits and server errors can clear up; anything else is a setup problem.
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(Error::Embedding(format!("embedding request failed (status {status})")));
            }
            return Err(Error::InvalidConfig(format!("embedding endpoint rejected request (status {status})")));
        }

        let mut resp: EmbeddingResponse =
            serde_json::from_str(&text).map_err(|e| Error::Embedding(format!("malformed embedding response: {e}")))?;
        if resp.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} inputs",
                resp.data.len(),
                texts.len()
            )));
        }
        resp.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = resp.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::InvalidConfig(format!(
                "dim mismatch: got {} expected {}",
                bad.len(),
                self.dim
            )));
        }
        Ok(vectors)
    }

    fn map_http(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Embedding(e.to_string())
        }
    }
}

impl EmbeddingClient for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        Box::pin(self.request(texts))
    }
}
