// src/retrieval/qdrant.rs
// Qdrant REST index over the ingested news collection

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{check_batch, Document, RetrievedDocument, VectorIndex};
use crate::error::{RagError, Result};
use crate::http::FAST_TIMEOUT;

pub const DEFAULT_COLLECTION: &str = "news_articles";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<Value>,
}

/// Qdrant-backed vector index.
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    pub collection_name: String,
}

impl QdrantIndex {
    /// Connect to a collection, creating it with Cosine distance and
    /// `dimensions`-sized vectors if it does not exist yet.
    pub async fn open(
        client: Client,
        url: &str,
        collection_name: &str,
        dimensions: usize,
    ) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();
        let collection_url = format!("{base_url}/collections/{collection_name}");

        match client.get(&collection_url).timeout(FAST_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Qdrant collection '{}' already exists", collection_name);
            }
            _ => {
                info!("Creating Qdrant collection '{}'", collection_name);

                let create_body = json!({
                    "vectors": {
                        "size": dimensions,
                        "distance": "Cosine"
                    }
                });

                let resp = client
                    .put(&collection_url)
                    .timeout(FAST_TIMEOUT)
                    .json(&create_body)
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    let error_text = resp.text().await.unwrap_or_default();
                    if !error_text.contains("already exists") {
                        return Err(RagError::Retrieval(format!(
                            "Failed to create Qdrant collection: {error_text}"
                        )));
                    }
                }
            }
        }

        Ok(Self {
            client,
            base_url,
            collection_name: collection_name.to_string(),
        })
    }

    fn points_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}/points{}", self.base_url, self.collection_name, suffix)
    }

    /// Qdrant only accepts integer or UUID point ids, so document ids are
    /// mapped onto stable v5 UUIDs.
    pub fn point_id(document_id: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, document_id.as_bytes())
    }

    async fn error_text(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>> {
        let search_body = json!({
            "vector": embedding,
            "limit": k,
            "with_payload": true
        });

        let response = self
            .client
            .post(self.points_url("/search"))
            .timeout(FAST_TIMEOUT)
            .json(&search_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RagError::Retrieval(format!(
                "Qdrant search failed: {}",
                Self::error_text(response).await
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let mut documents = Vec::with_capacity(parsed.result.len());
        for point in parsed.result {
            let Some(payload) = point.payload else {
                continue;
            };
            match serde_json::from_value::<Document>(payload) {
                Ok(document) => documents.push(RetrievedDocument {
                    document,
                    score: point.score,
                }),
                Err(e) => warn!(error = %e, "Skipping point with unreadable payload"),
            }
        }

        debug!(
            "Found {} documents in {}",
            documents.len(),
            self.collection_name
        );
        Ok(documents)
    }

    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        check_batch(documents, embeddings)?;
        if documents.is_empty() {
            return Ok(());
        }

        let points: Vec<Value> = documents
            .iter()
            .zip(embeddings)
            .map(|(document, vector)| -> Result<Value> {
                Ok(json!({
                    "id": Self::point_id(&document.id).to_string(),
                    "vector": vector,
                    "payload": serde_json::to_value(document)?
                }))
            })
            .collect::<Result<_>>()?;

        let response = self
            .client
            .put(self.points_url("?wait=true"))
            .timeout(FAST_TIMEOUT)
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RagError::Retrieval(format!(
                "Qdrant upsert failed: {}",
                Self::error_text(response).await
            )));
        }

        debug!(
            "Upserted {} documents into {}",
            documents.len(),
            self.collection_name
        );
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .post(self.points_url("/count"))
            .timeout(FAST_TIMEOUT)
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RagError::Retrieval(format!(
                "Qdrant count failed: {}",
                Self::error_text(response).await
            )));
        }

        let result: Value = response.json().await?;
        Ok(result["result"]["count"].as_u64().unwrap_or(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_id_is_stable() {
        assert_eq!(QdrantIndex::point_id("article-1"), QdrantIndex::point_id("article-1"));
        assert_ne!(QdrantIndex::point_id("article-1"), QdrantIndex::point_id("article-2"));
    }

    #[test]
    fn test_search_response_parsing() {
        let raw = r#"{
            "result": [
                {"id": "x", "score": 0.91, "payload": {"id": "a1", "title": "Rates", "content": "Rates rose", "url": "https://example.com/a1", "published_date": "2024-05-01", "source": "Wire", "category": "business"}},
                {"id": "y", "score": 0.42, "payload": null}
            ],
            "status": "ok"
        }"#;
        let parsed: SearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.len(), 2);
        let doc: Document = serde_json::from_value(parsed.result[0].payload.clone().unwrap()).unwrap();
        assert_eq!(doc.title, "Rates");
        assert!(parsed.result[1].payload.is_none());
    }
}
