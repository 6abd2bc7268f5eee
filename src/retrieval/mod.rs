// src/retrieval/mod.rs
// Nearest-neighbour document retrieval over a vector index

mod memory;
mod qdrant;

pub use self::memory::{cosine_similarity, MemoryIndex};
pub use self::qdrant::{QdrantIndex, DEFAULT_COLLECTION};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::Embedder;
use crate::error::{RagError, Result};

/// Documents fetched per query before context assembly
pub const DEFAULT_TOP_K: usize = 5;

/// A news article as written by the ingestion job. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "publishedDate")]
    pub published_date: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub document: Document,
    /// Higher is more similar
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` nearest documents, most relevant first. An empty index
    /// yields an empty result rather than an error.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>>;

    /// Insert or replace documents by id. `embeddings[i]` belongs to `documents[i]`.
    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

/// Turns a query into an embedding and fetches its nearest documents.
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            embedder,
            index,
            top_k,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        let embedding = self.embedder.embed(query).await;

        let documents = self
            .index
            .query(&embedding, self.top_k)
            .await
            .map_err(|e| match e {
                RagError::Retrieval(_) => e,
                other => RagError::Retrieval(other.to_string()),
            })?;

        debug!(found = documents.len(), top_k = self.top_k, "Retrieved documents");
        Ok(documents)
    }
}

pub(crate) fn check_batch(documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
    if documents.len() != embeddings.len() {
        return Err(RagError::Retrieval(format!(
            "{} documents but {} embeddings",
            documents.len(),
            embeddings.len()
        )));
    }
    Ok(())
}
