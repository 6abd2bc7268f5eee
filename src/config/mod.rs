// src/config/mod.rs
// Runtime configuration loaded from the environment (and .env)

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::Level;

use crate::embeddings::LOCAL_EMBEDDING_DIM;
use crate::error::{RagError, Result};
use crate::llm::DEFAULT_MODEL;
use crate::pipeline::DEFAULT_CACHE_TTL;
use crate::retrieval::{DEFAULT_COLLECTION, DEFAULT_TOP_K};
use crate::session::DEFAULT_SESSION_TTL;

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    // ── Stores
    pub redis_url: Option<String>,
    pub redis_password: Option<String>,
    pub qdrant_url: String,
    pub qdrant_collection: String,
    pub embedding_dim: usize,

    // ── Providers
    pub jina_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    // ── Lifetimes (seconds)
    pub session_ttl: u64,
    pub cache_ttl: u64,
    pub cleanup_interval: u64,

    // ── Retrieval
    pub retrieval_top_k: usize,

    // ── Server
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    // ── Logging
    pub log_level: String,
}

/// Read `key` through `lookup` and parse it, falling back to `default` when
/// the variable is missing or unparseable. Trailing `# comments` are ignored.
fn env_var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    // Runs before the subscriber is installed
                    eprintln!("Config: {key} = '{val}' (parse failed, using default)");
                    default
                }
            }
        }
        None => default,
    }
}

/// Optional string setting; blank values count as unset.
fn env_opt<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RagConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            redis_url: env_opt(&lookup, "REDIS_URL"),
            redis_password: env_opt(&lookup, "REDIS_PASSWORD"),
            qdrant_url: env_var_or(&lookup, "QDRANT_URL", "http://localhost:6333".to_string()),
            qdrant_collection: env_var_or(&lookup, "QDRANT_COLLECTION", DEFAULT_COLLECTION.to_string()),
            embedding_dim: env_var_or(&lookup, "EMBEDDING_DIM", 768),
            jina_api_key: env_opt(&lookup, "JINA_API_KEY"),
            gemini_api_key: env_opt(&lookup, "GEMINI_API_KEY"),
            gemini_model: env_var_or(&lookup, "GEMINI_MODEL", DEFAULT_MODEL.to_string()),
            session_ttl: env_var_or(&lookup, "SESSION_TTL", DEFAULT_SESSION_TTL.as_secs()),
            cache_ttl: env_var_or(&lookup, "CACHE_TTL", DEFAULT_CACHE_TTL.as_secs()),
            cleanup_interval: env_var_or(&lookup, "CLEANUP_INTERVAL", 300),
            retrieval_top_k: env_var_or(&lookup, "RETRIEVAL_TOP_K", DEFAULT_TOP_K),
            host: env_var_or(&lookup, "HOST", "0.0.0.0".to_string()),
            port: env_var_or(&lookup, "PORT", 5000),
            frontend_url: env_var_or(&lookup, "FRONTEND_URL", "http://localhost:3000".to_string()),
            log_level: env_var_or(&lookup, "LOG_LEVEL", "info".to_string()),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }

    /// Vector size of the collection: the provider's when Jina is
    /// configured, otherwise the local embedding's.
    pub fn index_dimension(&self) -> usize {
        if self.jina_api_key.is_some() {
            self.embedding_dim
        } else {
            LOCAL_EMBEDDING_DIM
        }
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval_top_k == 0 {
            return Err(RagError::Config("RETRIEVAL_TOP_K must be at least 1".to_string()));
        }
        if self.embedding_dim == 0 {
            return Err(RagError::Config("EMBEDDING_DIM must be at least 1".to_string()));
        }
        if self.session_ttl == 0 || self.cache_ttl == 0 {
            return Err(RagError::Config("SESSION_TTL and CACHE_TTL must be positive".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tracing level for `LOG_LEVEL`; unknown names mean `info`.
    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
