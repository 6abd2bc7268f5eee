// src/cache/memory.rs
// In-process TTL store backing the cache contract

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use glob::Pattern;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{resolve_range, CacheError, CacheResult, KvStore};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// `None` means the entry never expires (a list before its first `expire`).
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// Key-value store living in process memory.
///
/// Expiry deadlines use tokio's clock, so paused-time tests can advance past
/// a TTL without sleeping. Expired entries are invisible to reads and are
/// pruned on writes and key listing.
#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    open: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            open: AtomicBool::new(true),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CacheError::Unavailable("in-memory store is closed".to_string()))
        }
    }

    fn prune(entries: &mut HashMap<String, Entry>, now: Instant) {
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, "Pruned expired cache entries");
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let entries = self.entries.read().await;

        match entries.get(key).filter(|e| e.is_live(now)) {
            None => Ok(None),
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now);

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.ensure_open()?;
        let matcher = Pattern::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.msg.to_string(),
        })?;

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now);

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| matcher.matches(key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn push_front(&self, key: &str, value: &str) -> CacheResult<usize> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });

        match &mut entry.value {
            Value::List(list) => {
                list.push_front(value.to_string());
                Ok(list.len())
            }
            Value::Text(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    async fn trim(&self, key: &str, start: isize, stop: isize) -> CacheResult<()> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now);

        let Some(entry) = entries.get_mut(key) else {
            return Ok(());
        };
        let list = match &mut entry.value {
            Value::List(list) => list,
            Value::Text(_) => return Err(CacheError::WrongType(key.to_string())),
        };

        match resolve_range(list.len(), start, stop) {
            Some((from, to)) => {
                list.truncate(to + 1);
                list.drain(..from);
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn range(&self, key: &str, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let entries = self.entries.read().await;

        let list = match entries.get(key).filter(|e| e.is_live(now)) {
            None => return Ok(Vec::new()),
            Some(Entry { value: Value::List(list), .. }) => list,
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
        };

        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.entries.write().await.clear();
            info!("In-memory cache closed");
        }
    }
}
