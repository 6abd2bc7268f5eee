// tests/common/mod.rs
// Shared fixtures: counting model, failing cache, in-memory application state

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use newsrag::{
    cache::{CacheError, CacheResult, KvStore, MemoryStore},
    config::RagConfig,
    embeddings::Embedder,
    llm::LanguageModel,
    retrieval::{Document, MemoryIndex, VectorIndex},
    state::{AppState, Components},
    RagError, Result,
};

/// Language model that counts calls and answers with a fixed reply.
pub struct CountingModel {
    calls: AtomicUsize,
    reply: String,
    fail: bool,
}

impl CountingModel {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: String::new(),
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for CountingModel {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RagError::Generation("model offline".to_string()));
        }
        Ok(self.reply.clone())
    }
}

/// Cache that is never reachable.
pub struct UnreachableStore;

fn down<T>() -> CacheResult<T> {
    Err(CacheError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl KvStore for UnreachableStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        down()
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        down()
    }
    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        down()
    }
    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        down()
    }
    async fn push_front(&self, _key: &str, _value: &str) -> CacheResult<usize> {
        down()
    }
    async fn trim(&self, _key: &str, _start: isize, _stop: isize) -> CacheResult<()> {
        down()
    }
    async fn range(&self, _key: &str, _start: isize, _stop: isize) -> CacheResult<Vec<String>> {
        down()
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> CacheResult<bool> {
        down()
    }
    async fn close(&self) {}
}

pub fn article(id: &str, title: &str, content: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        url: format!("https://news.example/{id}"),
        published_date: "2024-05-01".to_string(),
        source: "Example Wire".to_string(),
        category: "world".to_string(),
    }
}

pub fn sample_articles() -> Vec<Document> {
    vec![
        article("a1", "Election results", "The incumbent won the election by a narrow margin."),
        article("a2", "Rates decision", "The central bank held interest rates steady."),
    ]
}

/// Index pre-loaded with `documents` under local embeddings.
pub async fn seeded_index(documents: &[Document]) -> Arc<MemoryIndex> {
    let index = Arc::new(MemoryIndex::new());
    let embedder = Embedder::local();
    let texts: Vec<String> = documents
        .iter()
        .map(|d| format!("{}\n\n{}", d.title, d.content))
        .collect();
    let embeddings = embedder.embed_batch(&texts).await;
    index.upsert(documents, &embeddings).await.unwrap();
    index
}

pub fn state_with(
    cache: Arc<dyn KvStore>,
    index: Arc<dyn VectorIndex>,
    model: Option<Arc<dyn LanguageModel>>,
) -> AppState {
    AppState::assemble(
        RagConfig::default(),
        Components {
            cache,
            index,
            embedding_provider: None,
            model,
        },
    )
}

/// In-memory state over the sample articles with the given model.
pub async fn test_state(model: Arc<CountingModel>) -> AppState {
    let index = seeded_index(&sample_articles()).await;
    state_with(
        Arc::new(MemoryStore::new()),
        index,
        Some(model as Arc<dyn LanguageModel>),
    )
}
