//! HTTP client for Ollama with connection pooling.
//!
//! Create once at startup and share behind an `Arc`; every request then
//! reuses the pooled connections. The streaming call hands back the raw
//! byte stream untouched; re-framing is the stream translator's job.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use log::error;
use reqwest::Client;
use serde_json::Value;

use crate::error::OllamaClientError;
use gateway_models::{OpenAIChatCompletionsRequest, OpenAIChatCompletionsResponse};

pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, OllamaClientError>> + Send + 'static>>;

/// Backend contract the gateway depends on. A trait seam so tests can
/// substitute a scripted backend.
#[async_trait]
pub trait OllamaClientTrait: Send + Sync {
    /// POST `/v1/messages`, whole response.
    async fn chat_anthropic_compat(&self, payload: &Value) -> Result<Value, OllamaClientError>;

    /// POST `/v1/messages` with `stream: true`; yields raw SSE bytes.
    async fn chat_anthropic_compat_stream(
        &self,
        payload: &Value,
    ) -> Result<ByteStream, OllamaClientError>;

    /// POST `/v1/chat/completions` (legacy flattened target).
    async fn chat_openai_compat(
        &self,
        request: &OpenAIChatCompletionsRequest,
    ) -> Result<OpenAIChatCompletionsResponse, OllamaClientError>;

    /// POST `/api/show`; returns the raw introspection document.
    async fn show_model(&self, model: &str) -> Result<Value, OllamaClientError>;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_seconds: f64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OllamaClientError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            error!("Ollama upstream error on {path}: status {status}");
            return Err(OllamaClientError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }
        let data = response
            .json::<Value>()
            .await
            .map_err(OllamaClientError::ConnectionFailed)?;
        Ok(if data.is_object() { data } else { Value::Object(Default::default()) })
    }
}

#[async_trait]
impl OllamaClientTrait for OllamaClient {
    async fn chat_anthropic_compat(&self, payload: &Value) -> Result<Value, OllamaClientError> {
        self.post_json("/v1/messages", payload).await
    }

    async fn chat_anthropic_compat_stream(
        &self,
        payload: &Value,
    ) -> Result<ByteStream, OllamaClientError> {
        let response = self
            .client
            .post(self.url("/v1/messages"))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            // Read the error body before surfacing; truncated for logs.
            let body = response.text().await.unwrap_or_default();
            return Err(OllamaClientError::UpstreamStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }
        let stream = response
            .bytes_stream()
            .map_err(OllamaClientError::ConnectionFailed);
        Ok(stream.boxed())
    }

    async fn chat_openai_compat(
        &self,
        request: &OpenAIChatCompletionsRequest,
    ) -> Result<OpenAIChatCompletionsResponse, OllamaClientError> {
        let body = serde_json::to_value(request).map_err(OllamaClientError::InvalidBody)?;
        let data = self.post_json("/v1/chat/completions", &body).await?;
        serde_json::from_value(data).map_err(OllamaClientError::InvalidBody)
    }

    async fn show_model(&self, model: &str) -> Result<Value, OllamaClientError> {
        self.post_json("/api/show", &serde_json::json!({"model": model}))
            .await
    }
}
