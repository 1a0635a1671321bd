//! OpenAI-compatible HTTP transport for embedding calls.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbedModel;

/// Async embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// The bearer token is optional so local model servers that expose the
/// same wire format work without credentials.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpEmbedder {
    /// Builds a new transport against the given base URL.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(!base_url.trim().is_empty(), "missing embedding base URL");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.filter(|key| !key.trim().is_empty()) {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid embedding API key")?,
            );
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbedModel for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("embedding request failed ({status}): {body}");
        }
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("failed to parse embedding response")?;
        let entry = parsed
            .data
            .into_iter()
            .next()
            .context("embedding response contained no vectors")?;
        Ok(entry.embedding)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
