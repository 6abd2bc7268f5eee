// src/error.rs
// Error taxonomy for the query pipeline and session layer

use thiserror::Error;

use crate::cache::CacheError;
use crate::session::SessionError;

/// Main error type for the newsrag library
#[derive(Error, Debug)]
pub enum RagError {
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("embedding provider failure: {0}")]
    Embedding(String),

    #[error("retrieval failure: {0}")]
    Retrieval(String),

    #[error("generation failure: {0}")]
    Generation(String),

    #[error("session store failure: {0}")]
    SessionStore(#[from] SessionError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Result using RagError
pub type Result<T> = std::result::Result<T, RagError>;

impl From<CacheError> for RagError {
    fn from(err: CacheError) -> Self {
        RagError::CacheUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = RagError::Generation("quota exceeded".to_string());
        assert!(err.to_string().contains("generation failure"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_from_cache_error() {
        let err: RagError = CacheError::Unavailable("store closed".to_string()).into();
        assert!(matches!(err, RagError::CacheUnavailable(_)));
        assert!(err.to_string().contains("store closed"));
    }

    #[test]
    fn test_from_session_error() {
        let err: RagError = SessionError::Corrupt {
            key: "session:abc".to_string(),
            reason: "expected value".to_string(),
        }
        .into();
        assert!(matches!(err, RagError::SessionStore(_)));
        assert!(err.to_string().contains("session:abc"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: RagError = json_err.into();
        assert!(matches!(err, RagError::Json(_)));
    }
}
