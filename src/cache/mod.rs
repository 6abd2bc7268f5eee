// src/cache/mod.rs
// Key-value cache contract shared by the session store and the query pipeline

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backing store cannot be reached (or has been closed).
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("key '{0}' holds a value of the wrong type")]
    WrongType(String),

    #[error("invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Get/set-with-expiry store with the handful of list operations the
/// session history needs.
///
/// Every operation is idempotent and safe under concurrent callers; there is
/// no ordering between concurrent writers to one key (last write wins).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`; it disappears on its own after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Remove `key` immediately. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Keys matching a glob pattern such as `session:*`.
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    /// Prepend to the list at `key`, creating it if needed. Returns the new length.
    async fn push_front(&self, key: &str, value: &str) -> CacheResult<usize>;

    /// Keep only the inclusive range `start..=stop` of the list at `key`.
    async fn trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()>;

    /// Inclusive slice of the list at `key`; negative indices count from the end.
    async fn range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>>;

    /// Reset the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Release the store. Later calls fail with [`CacheError::Unavailable`].
    async fn close(&self);
}

/// Resolve list indices the way Redis LRANGE/LTRIM do: negative values count
/// from the end, out-of-range stops are clamped, and an empty selection
/// yields `None`.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    if len == 0 {
        return None;
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }

    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_full_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
    }

    #[test]
    fn test_resolve_clamps_stop() {
        assert_eq!(resolve_range(3, 0, 49), Some((0, 2)));
    }

    #[test]
    fn test_resolve_negative_start() {
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, -10, 1), Some((0, 1)));
    }

    #[test]
    fn test_resolve_empty_selection() {
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(5, 7, 9), None);
        assert_eq!(resolve_range(5, 0, -6), None);
    }
}
