use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use corpusdb_core::config::ContextSettings;
use corpusdb_core::error::{Error, Result};
use corpusdb_core::traits::Contextualizer;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. Summarize the following text in about 200 tokens, \
focusing on the main characters, events, and themes.";

/// Summarizes chunk windows through an OpenAI-compatible `POST {base_url}/chat/completions`.
pub struct ChatContextualizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    model_id: String,
    api_key: Option<String>,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ApiMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatContextualizer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        Ok(Self { client, model_id: format!("openai:{model}"), base_url, model, api_key, max_tokens, timeout })
    }

    pub fn from_settings(settings: &ContextSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(var = %settings.api_key_env, "no context model API key set");
        }
        Self::new(
            settings.base_url.clone(),
            settings.model.clone(),
            api_key,
            settings.max_tokens,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    async fn request(&self, window: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ApiMessage { role: "system", content: SYSTEM_PROMPT },
                ApiMessage { role: "user", content: window },
            ],
            max_tokens: self.max_tokens,
        };
        let mut req = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let response = req.send().await.map_err(|e| self.map_http(&e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_http(&e))?;

        if !status.is_success() {
            tracing::error!("chat API error {status}: {text}");
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(Error::Context(format!("chat request failed (status {status})")));
            }
            return Err(Error::InvalidConfig(format!("chat endpoint rejected request (status {status})")));
        }

        let resp: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::Context(format!("malformed chat response: {e}")))?;
        let summary = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if summary.is_empty() {
            return Err(Error::Context("chat response had no content".into()));
        }
        Ok(summary)
    }

    fn map_http(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Context(e.to_string())
        }
    }
}

impl Contextualizer for ChatContextualizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn summarize<'a>(&'a self, window: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request(window))
    }
}
