// src/session/mod.rs
// Session records and bounded chat history stored in the key-value cache

mod sweeper;

pub use self::sweeper::{run_cleanup_cycle, spawn_cleanup_scheduler};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, KvStore};

pub const SESSION_PREFIX: &str = "session:";
pub const HISTORY_SUFFIX: &str = ":history";

/// Most recent entries kept per session.
pub const MAX_HISTORY: usize = 50;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// One of the two session keys was removed, the other was not.
    #[error("session only partially cleared, '{key}' remains: {source}")]
    PartialClear {
        key: String,
        #[source]
        source: CacheError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
}

/// One question/answer exchange. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub user: String,
    pub bot: String,
    pub timestamp: DateTime<Utc>,
}

pub fn session_key(id: &str) -> String {
    format!("{SESSION_PREFIX}{id}")
}

pub fn history_key(id: &str) -> String {
    format!("{SESSION_PREFIX}{id}{HISTORY_SUFFIX}")
}

/// Owns every session record and history list in the cache.
pub struct SessionStore {
    cache: Arc<dyn KvStore>,
    ttl: Duration,
    last_entry_id: AtomicI64,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            last_entry_id: AtomicI64::new(0),
        }
    }

    /// Write a fresh session record, overwriting any previous one.
    pub async fn create_session(&self, id: &str) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = Session {
            id: id.to_string(),
            created_at: now,
            last_activity: now,
            message_count: 0,
        };

        self.write_session(&session).await?;
        info!(session_id = %id, "Created session");
        Ok(session)
    }

    /// Fetch a session record. Unreadable records are logged and reported absent.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let key = session_key(id);
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable session record");
                Ok(None)
            }
        }
    }

    /// Return the existing session, creating one if it is missing.
    /// The boolean is true when the session was created by this call.
    pub async fn ensure_session(&self, id: &str) -> Result<(Session, bool), SessionError> {
        match self.get_session(id).await? {
            Some(session) => Ok((session, false)),
            None => Ok((self.create_session(id).await?, true)),
        }
    }

    /// Bump the message count and refresh `lastActivity` and the record TTL.
    ///
    /// This is a read-modify-write over the cache with no locking: two
    /// concurrent calls for one session can both read the same count, and
    /// the later write wins.
    pub async fn update_activity(&self, id: &str) -> Result<Session, SessionError> {
        let (mut session, created) = self.ensure_session(id).await?;
        if created {
            return Ok(session);
        }

        session.last_activity = Utc::now();
        session.message_count += 1;
        self.write_session(&session).await?;
        Ok(session)
    }

    /// Record an exchange. The history list is updated before the session
    /// activity, so a failure in the latter still leaves the entry stored.
    pub async fn add_to_history(
        &self,
        id: &str,
        user: &str,
        bot: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<HistoryEntry, SessionError> {
        let entry = HistoryEntry {
            id: self.next_entry_id().to_string(),
            user: user.to_string(),
            bot: bot.to_string(),
            timestamp,
        };
        let key = history_key(id);
        let raw = serde_json::to_string(&entry).map_err(|e| SessionError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        self.cache.push_front(&key, &raw).await?;
        self.cache.trim(&key, 0, MAX_HISTORY as isize - 1).await?;
        self.cache.expire(&key, self.ttl).await?;

        self.update_activity(id).await?;

        debug!(session_id = %id, entry_id = %entry.id, "Added message to history");
        Ok(entry)
    }

    /// History entries, oldest first.
    pub async fn get_session_history(&self, id: &str) -> Result<Vec<HistoryEntry>, SessionError> {
        let key = history_key(id);
        let raw_entries = self.cache.range(&key, 0, -1).await?;

        let mut history: Vec<HistoryEntry> = raw_entries
            .iter()
            .filter_map(|raw| match serde_json::from_str(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable history entry");
                    None
                }
            })
            .collect();
        history.reverse();
        Ok(history)
    }

    /// Remove the session record and its history.
    pub async fn clear_session(&self, id: &str) -> Result<(), SessionError> {
        let record_key = session_key(id);
        let list_key = history_key(id);

        let (record, history) =
            tokio::join!(self.cache.delete(&record_key), self.cache.delete(&list_key));

        match (record, history) {
            (Ok(_), Ok(_)) => {
                info!(session_id = %id, "Cleared session");
                Ok(())
            }
            (Err(e), Err(_)) => Err(SessionError::Cache(e)),
            (Err(e), Ok(_)) => Err(SessionError::PartialClear { key: record_key, source: e }),
            (Ok(_), Err(e)) => Err(SessionError::PartialClear { key: list_key, source: e }),
        }
    }

    /// Every session record currently in the cache.
    pub async fn list_active_sessions(&self) -> Result<Vec<Session>, SessionError> {
        let keys = self.cache.keys(&format!("{SESSION_PREFIX}*")).await?;

        let mut sessions = Vec::new();
        for key in keys.iter().filter(|k| !k.ends_with(HISTORY_SUFFIX)) {
            let id = &key[SESSION_PREFIX.len()..];
            if let Some(session) = self.get_session(id).await? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    /// Clear sessions idle for longer than the TTL, even if the cache has
    /// not evicted them yet. Returns how many were cleared.
    pub async fn cleanup_expired_sessions(&self) -> Result<usize, SessionError> {
        let sessions = self.list_active_sessions().await?;
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);

        let mut cleaned = 0;
        for session in sessions {
            if now.signed_duration_since(session.last_activity) <= ttl {
                continue;
            }
            match self.clear_session(&session.id).await {
                Ok(()) => cleaned += 1,
                Err(e) => warn!(session_id = %session.id, error = %e, "Failed to clear expired session"),
            }
        }

        if cleaned > 0 {
            info!(cleaned, "Cleaned up expired sessions");
        }
        Ok(cleaned)
    }

    async fn write_session(&self, session: &Session) -> Result<(), SessionError> {
        let key = session_key(&session.id);
        let raw = serde_json::to_string(session).map_err(|e| SessionError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        self.cache.set(&key, &raw, self.ttl).await?;
        Ok(())
    }

    /// Millisecond timestamp, bumped past the previous id when two entries
    /// land in the same millisecond.
    fn next_entry_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_entry_id.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_entry_id.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}
