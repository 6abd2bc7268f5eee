// src/pipeline.rs
// Query orchestration: answer cache, retrieval, generation and history append

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::KvStore;
use crate::error::{RagError, Result};
use crate::llm::ResponseGenerator;
use crate::retrieval::Retriever;
use crate::session::SessionStore;

pub const CACHE_PREFIX: &str = "rag_cache:";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1800);

/// Returned when retrieval or generation fails. Never cached.
pub const APOLOGY_ANSWER: &str =
    "I'm sorry, I encountered an error while processing your question. Please try again.";

/// Cache key for a query: exact bytes, no normalization, independent of session.
pub fn cache_key(query: &str) -> String {
    format!("{CACHE_PREFIX}{}", STANDARD.encode(query.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub answer: String,
    pub cached: bool,
}

/// One completed exchange as delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user: String,
    pub bot: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_cached_queries: usize,
    pub cache_prefix: String,
    #[serde(rename = "cacheTTL")]
    pub cache_ttl: u64,
}

pub struct QueryOrchestrator {
    cache: Arc<dyn KvStore>,
    retriever: Arc<Retriever>,
    generator: Arc<ResponseGenerator>,
    sessions: Arc<SessionStore>,
    cache_ttl: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        cache: Arc<dyn KvStore>,
        retriever: Arc<Retriever>,
        generator: Arc<ResponseGenerator>,
        sessions: Arc<SessionStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            retriever,
            generator,
            sessions,
            cache_ttl,
        }
    }

    /// Answer a query. Never fails: cache trouble is treated as a miss, and
    /// retrieval or generation trouble yields [`APOLOGY_ANSWER`], which is
    /// never cached. Only a genuinely empty retrieval gives the fallback.
    pub async fn process_query(&self, query: &str, session_id: &str) -> QueryResult {
        let key = cache_key(query);

        if let Some(answer) = self.cached_answer(&key).await {
            info!(session_id = %session_id, "Returning cached response");
            return QueryResult { answer, cached: true };
        }

        let documents = match self.retriever.retrieve(query).await {
            Ok(documents) => documents,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Retrieval failed");
                return QueryResult {
                    answer: APOLOGY_ANSWER.to_string(),
                    cached: false,
                };
            }
        };
        debug!(session_id = %session_id, documents = documents.len(), "Retrieved documents for query");

        let answer = match self.generator.generate(query, &documents).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Response generation failed");
                return QueryResult {
                    answer: APOLOGY_ANSWER.to_string(),
                    cached: false,
                };
            }
        };

        self.store_answer(&key, &answer).await;

        QueryResult { answer, cached: false }
    }

    /// Answer `message` and record the exchange in the session history.
    pub async fn chat(&self, message: &str, session_id: &str) -> Result<ChatTurn> {
        let result = self.process_query(message, session_id).await;
        let timestamp = Utc::now();

        self.sessions
            .add_to_history(session_id, message, &result.answer, timestamp)
            .await?;

        Ok(ChatTurn {
            user: message.to_string(),
            bot: result.answer,
            timestamp,
        })
    }

    /// Drop every cached answer. Returns how many were removed.
    pub async fn clear_cache(&self) -> Result<usize> {
        let keys = self.cache.keys(&format!("{CACHE_PREFIX}*")).await?;

        let mut removed = 0;
        for key in &keys {
            if self.cache.delete(key).await? {
                removed += 1;
            }
        }

        info!(removed, "Cleared query cache");
        Ok(removed)
    }

    /// Cache statistics. A failing cache reports zero entries.
    pub async fn cache_stats(&self) -> CacheStats {
        let total_cached_queries = match self.cache.keys(&format!("{CACHE_PREFIX}*")).await {
            Ok(keys) => keys.len(),
            Err(e) => {
                warn!(error = %e, "Failed to count cached queries");
                0
            }
        };

        CacheStats {
            total_cached_queries,
            cache_prefix: CACHE_PREFIX.to_string(),
            cache_ttl: self.cache_ttl.as_secs(),
        }
    }

    async fn cached_answer(&self, key: &str) -> Option<String> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<String>(&raw) {
            Ok(answer) => Some(answer),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    async fn store_answer(&self, key: &str, answer: &str) {
        let raw = match serde_json::to_string(answer) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %RagError::from(e), "Failed to encode answer for cache");
                return;
            }
        };

        if let Err(e) = self.cache.set(key, &raw, self.cache_ttl).await {
            warn!(error = %e, "Cache write failed, answer not cached");
        }
    }
}
