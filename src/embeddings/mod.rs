// src/embeddings/mod.rs
// Embedding provider abstraction with a deterministic local fallback

mod jina;

pub use self::jina::JinaEmbeddings;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;

/// Dimension of the local fallback embedding
pub const LOCAL_EMBEDDING_DIM: usize = 384;

/// Remote text embedding service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identifier for logging
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic bag-of-characters embedding used when no provider answers.
///
/// Lowercases and splits on whitespace; every UTF-16 code unit `c` at
/// position `j` of token `i` adds `sin(c * 0.1) * 0.1` to slot
/// `(c + i + j) % 384`. The result is L2-normalized, and a zero vector is
/// returned unchanged.
pub fn local_embedding(text: &str) -> Vec<f32> {
    let lowered = text.to_lowercase();
    let mut acc = vec![0.0f64; LOCAL_EMBEDDING_DIM];

    // A leading whitespace run counts as an empty first token.
    let offset = usize::from(lowered.starts_with(char::is_whitespace));

    for (position, token) in lowered.split_whitespace().enumerate() {
        let i = position + offset;
        for (j, unit) in token.encode_utf16().enumerate() {
            let code = unit as usize;
            let slot = (code + i + j) % LOCAL_EMBEDDING_DIM;
            acc[slot] += (unit as f64 * 0.1).sin() * 0.1;
        }
    }

    let magnitude = acc.iter().map(|v| v * v).sum::<f64>().sqrt();
    acc.into_iter()
        .map(|v| if magnitude > 0.0 { (v / magnitude) as f32 } else { 0.0 })
        .collect()
}

/// Embeds text through the configured provider, degrading to
/// [`local_embedding`] on any provider failure. Never fails.
pub struct Embedder {
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl Embedder {
    pub fn new(provider: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { provider }
    }

    /// Embedder that only ever uses the local fallback
    pub fn local() -> Self {
        Self { provider: None }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().map_or("local", |p| p.name())
    }

    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let Some(provider) = &self.provider else {
            debug!("No embedding provider configured, using local embedding");
            return local_embedding(text);
        };

        match provider.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Embedding provider failed, using local embedding");
                local_embedding(text)
            }
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let fallback = || -> Vec<Vec<f32>> { texts.iter().map(|t| local_embedding(t)).collect() };

        let Some(provider) = &self.provider else {
            return fallback();
        };

        match provider.embed_batch(texts).await {
            Ok(embeddings) if embeddings.len() == texts.len() => embeddings,
            Ok(embeddings) => {
                warn!(
                    provider = provider.name(),
                    expected = texts.len(),
                    got = embeddings.len(),
                    "Embedding batch size mismatch, using local embeddings"
                );
                fallback()
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Batch embedding failed, using local embeddings");
                fallback()
            }
        }
    }
}
