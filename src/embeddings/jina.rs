// src/embeddings/jina.rs
// Jina AI embeddings API client (jina-embeddings-v2-base-en)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::FAST_TIMEOUT;

const API_URL: &str = "https://api.jina.ai/v1/embeddings";

pub const DEFAULT_MODEL: &str = "jina-embeddings-v2-base-en";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: Option<String>,
}

/// Jina embeddings client
pub struct JinaEmbeddings {
    api_key: String,
    model: String,
    http_client: reqwest::Client,
}

impl JinaEmbeddings {
    pub fn new(api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            http_client,
        }
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input,
            encoding_format: "float",
        };

        let response = self
            .http_client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .timeout(FAST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.detail)
                .unwrap_or_default();
            return Err(RagError::Embedding(format!("Jina API error {status}: {detail}")));
        }

        let mut parsed: EmbeddingResponse = response.json().await?;
        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), model = %self.model, "Received embeddings");

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for JinaEmbeddings {
    fn name(&self) -> &str {
        "jina"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        self.request(&input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("Jina returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let input = vec!["hello".to_string()];
        let body = EmbeddingRequest {
            model: DEFAULT_MODEL,
            input: &input,
            encoding_format: "float",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "jina-embeddings-v2-base-en");
        assert_eq!(json["input"][0], "hello");
        assert_eq!(json["encoding_format"], "float");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"data":[{"embedding":[0.5,0.25],"index":0}],"usage":{"total_tokens":3}}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.5, 0.25]);
    }
}
