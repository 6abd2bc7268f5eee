// src/retrieval/memory.rs
// Brute-force cosine index held in process memory

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{check_batch, Document, RetrievedDocument, VectorIndex};
use crate::error::Result;

/// Cosine similarity between two embeddings; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Linear-scan index. Fine for test corpora and small deployments.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    points: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>> {
        let points = self.points.read().await;

        let mut scored: Vec<RetrievedDocument> = points
            .iter()
            .map(|(document, vector)| RetrievedDocument {
                document: document.clone(),
                score: cosine_similarity(embedding, vector),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn upsert(&self, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
        check_batch(documents, embeddings)?;
        let mut points = self.points.write().await;

        for (document, vector) in documents.iter().zip(embeddings) {
            match points.iter_mut().find(|(existing, _)| existing.id == document.id) {
                Some(slot) => *slot = (document.clone(), vector.clone()),
                None => points.push((document.clone(), vector.clone())),
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.points.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            content: format!("content {id}"),
            ..Default::default()
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = MemoryIndex::new();
        index
            .upsert(
                &[doc("far"), doc("near"), doc("mid")],
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]],
            )
            .await
            .unwrap();

        let results = index.query(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = MemoryIndex::new();
        index.upsert(&[doc("a")], &[vec![1.0]]).await.unwrap();
        let mut updated = doc("a");
        updated.title = "Updated".to_string();
        index.upsert(&[updated], &[vec![1.0]]).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        let results = index.query(&[1.0], 5).await.unwrap();
        assert_eq!(results[0].document.title, "Updated");
    }
}
