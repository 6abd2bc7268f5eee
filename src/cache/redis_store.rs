// src/cache/redis_store.rs
// Redis-backed store so sessions and cached answers survive restarts and are shared

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionInfo, FromRedisValue, IntoConnectionInfo, RedisError, RedisResult};
use tracing::{debug, info};

use super::{CacheError, CacheResult, KvStore};

/// Parse `url`, filling in `password` unless the URL already carries one.
pub fn connection_info(url: &str, password: Option<&str>) -> RedisResult<ConnectionInfo> {
    let mut info = url.into_connection_info()?;
    if info.redis.password.is_none() {
        info.redis.password = password.map(str::to_string);
    }
    Ok(info)
}

fn map_error(key: &str, err: RedisError) -> CacheError {
    if err.code() == Some("WRONGTYPE") {
        CacheError::WrongType(key.to_string())
    } else {
        CacheError::Unavailable(err.to_string())
    }
}

/// Whole seconds for SETEX/EXPIRE, which reject zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Store over a Redis server. The connection manager reconnects on its own;
/// commands issued while the server is down fail as unavailable.
pub struct RedisStore {
    connection: ConnectionManager,
    open: AtomicBool,
}

impl RedisStore {
    pub async fn connect(url: &str, password: Option<&str>) -> CacheResult<Self> {
        let info = connection_info(url, password)
            .map_err(|e| CacheError::Unavailable(format!("invalid REDIS_URL: {e}")))?;
        let address = info.addr.to_string();

        let client = Client::open(info).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;

        info!(address = %address, "Connected to Redis");
        Ok(Self {
            connection,
            open: AtomicBool::new(true),
        })
    }

    async fn query<T: FromRedisValue>(&self, key: &str, cmd: &redis::Cmd) -> CacheResult<T> {
        if !self.open.load(Ordering::Acquire) {
            return Err(CacheError::Unavailable("Redis store is closed".to_string()));
        }

        let mut connection = self.connection.clone();
        cmd.query_async(&mut connection)
            .await
            .map_err(|e| map_error(key, e))
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.query(key, redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.query(key, redis::cmd("SETEX").arg(key).arg(ttl_secs(ttl)).arg(value))
            .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let removed: usize = self.query(key, redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut keys: Vec<String> = self.query(pattern, redis::cmd("KEYS").arg(pattern)).await?;
        keys.sort();
        debug!(pattern = %pattern, count = keys.len(), "Listed Redis keys");
        Ok(keys)
    }

    async fn push_front(&self, key: &str, value: &str) -> CacheResult<usize> {
        self.query(key, redis::cmd("LPUSH").arg(key).arg(value)).await
    }

    async fn trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        self.query(key, redis::cmd("LTRIM").arg(key).arg(start).arg(stop))
            .await
    }

    async fn range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        self.query(key, redis::cmd("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.query(key, redis::cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)))
            .await
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            info!("Redis cache closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_fills_missing_credentials() {
        let info = connection_info("redis://cache:6379", Some("hunter2")).unwrap();
        assert_eq!(info.redis.password.as_deref(), Some("hunter2"));

        let info = connection_info("redis://:inline@cache:6379", Some("hunter2")).unwrap();
        assert_eq!(info.redis.password.as_deref(), Some("inline"));

        let info = connection_info("redis://cache:6379", None).unwrap();
        assert!(info.redis.password.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_unavailable() {
        let err = RedisStore::connect("not a url", None).await.err().unwrap();
        assert!(matches!(err, CacheError::Unavailable(ref msg) if msg.contains("REDIS_URL")));
    }

    #[test]
    fn test_connection_errors_map_to_unavailable() {
        let err = RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        assert!(matches!(map_error("session:a", err), CacheError::Unavailable(_)));
    }

    #[test]
    fn test_ttl_is_at_least_one_second() {
        assert_eq!(ttl_secs(Duration::from_millis(200)), 1);
        assert_eq!(ttl_secs(Duration::from_secs(1800)), 1800);
    }
}
