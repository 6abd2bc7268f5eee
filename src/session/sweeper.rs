// src/session/sweeper.rs
//! Periodic sweep of idle sessions.
//!
//! The cache evicts session keys on its own once their TTL lapses; this
//! task additionally clears records whose `lastActivity` is older than the
//! session TTL, covering stores that keep keys alive longer than expected.

use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use super::{SessionError, SessionStore};

/// Spawn the background cleanup task.
///
/// `interval` is the time between sweeps (e.g., 5m).
pub fn spawn_cleanup_scheduler(
    sessions: Arc<SessionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(err) = run_cleanup_cycle(&sessions).await {
                warn!("session cleanup cycle failed: {err}");
            }
        }
    })
}

/// One sweep. Safe/idempotent.
pub async fn run_cleanup_cycle(sessions: &SessionStore) -> Result<usize, SessionError> {
    let cleaned = sessions.cleanup_expired_sessions().await?;
    debug!(cleaned, "Session cleanup cycle finished");
    Ok(cleaned)
}
