// src/http.rs
// Shared HTTP client for provider and vector index calls

use std::time::Duration;

/// Request timeout for generation calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for embeddings and vector index calls
pub const FAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the shared HTTP client.
///
/// Built once at startup and handed to every provider client. The pipeline
/// itself enforces no deadlines, so these timeouts are the only ones a
/// request is subject to.
pub fn create_shared_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
