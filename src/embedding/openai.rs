//! OpenAI-compatible `/embeddings` client.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::error::{EmbeddingError, EmbeddingResult};
use super::provider::EmbeddingProvider;
use crate::config::Config;

/// Embedding provider speaking the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: Client,
    url: String,
    model: String,
    dimensions: Option<usize>,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    pub fn new(
        api_base: &str,
        api_key: Option<&str>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> EmbeddingResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                EmbeddingError::InvalidConfig {
                    reason: format!("invalid api key header: {e}"),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", api_base.trim_end_matches('/')),
            model: model.into(),
            dimensions: None,
        })
    }

    pub fn from_config(config: &Config) -> EmbeddingResult<Self> {
        Self::new(
            &config.embedding_api_base,
            config.embedding_api_key.as_deref(),
            config.embedding_model.clone(),
            config.provider_timeout,
        )
    }

    /// Requests shortened vectors from models that support it.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = json!({
            "model": self.model,
            "input": texts,
        });
        if let Some(dimensions) = self.dimensions {
            body["dimensions"] = json!(dimensions);
        }

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response.json().await?;
        let vectors = parse_embedding_response(json)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        debug!(vectors = vectors.len(), "embedding batch complete");
        Ok(vectors)
    }
}

/// Extracts `data[].embedding` ordered by `data[].index`.
pub fn parse_embedding_response(json: Value) -> EmbeddingResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| EmbeddingError::InvalidResponse {
            reason: "missing data array".to_string(),
        })?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map_or(fallback_index, |v| v as usize);
        let embedding = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| EmbeddingError::InvalidResponse {
                reason: format!("item {fallback_index} has no embedding array"),
            })?;

        let vector = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|n| n as f32)
                    .ok_or_else(|| EmbeddingError::InvalidResponse {
                        reason: "embedding values must be numeric".to_string(),
                    })
            })
            .collect::<EmbeddingResult<Vec<f32>>>()?;
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
