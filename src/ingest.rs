// src/ingest.rs
// Loads prepared article files into the vector index

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::retrieval::{Document, VectorIndex};

pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub read: usize,
    pub duplicates: usize,
    pub empty: usize,
    pub stored: usize,
}

/// Parse a JSON array of documents.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Coarse category from the article URL, `general` when nothing matches.
pub fn category_from_url(url: &str) -> &'static str {
    const CATEGORIES: [(&str, &str); 6] = [
        ("business", "business"),
        ("tech", "technology"),
        ("world", "world"),
        ("health", "health"),
        ("science", "science"),
        ("sports", "sports"),
    ];

    let url = url.to_lowercase();
    for (needle, category) in CATEGORIES {
        if url.contains(needle) {
            return category;
        }
    }
    "general"
}

/// Text that gets embedded for a document
fn embedding_text(document: &Document) -> String {
    format!("{}\n\n{}", document.title, document.content)
}

/// Drop empty and duplicate-title articles and fill in missing ids and
/// categories. The first article with a given title wins.
fn prepare(documents: Vec<Document>, report: &mut IngestReport) -> Vec<Document> {
    let mut seen_titles = HashSet::new();
    let mut prepared = Vec::with_capacity(documents.len());

    for mut document in documents {
        if document.content.trim().is_empty() {
            report.empty += 1;
            continue;
        }
        if !seen_titles.insert(document.title.clone()) {
            report.duplicates += 1;
            continue;
        }
        if document.id.is_empty() {
            document.id = Uuid::new_v4().to_string();
        }
        if document.category.is_empty() {
            document.category = category_from_url(&document.url).to_string();
        }
        prepared.push(document);
    }
    prepared
}

/// Embed `documents` in batches of `batch_size` and upsert them.
pub async fn ingest_documents(
    embedder: &Embedder,
    index: &dyn VectorIndex,
    documents: Vec<Document>,
    batch_size: usize,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        read: documents.len(),
        ..Default::default()
    };
    let documents = prepare(documents, &mut report);
    let batch_size = batch_size.max(1);
    let batches = documents.len().div_ceil(batch_size);

    for (number, batch) in documents.chunks(batch_size).enumerate() {
        debug!("Embedding batch {}/{}", number + 1, batches);
        let texts: Vec<String> = batch.iter().map(embedding_text).collect();
        let embeddings = embedder.embed_batch(&texts).await;
        index.upsert(batch, &embeddings).await?;
        report.stored += batch.len();
    }

    info!(
        read = report.read,
        stored = report.stored,
        duplicates = report.duplicates,
        empty = report.empty,
        "Ingestion finished"
    );
    Ok(report)
}
