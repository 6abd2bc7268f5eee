// src/api/mod.rs
// HTTP and WebSocket gateways over the query pipeline

pub mod error;
pub mod http;
pub mod hub;
pub mod ws;

pub use error::{ApiError, ApiResult};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match HeaderValue::from_str(frontend_url) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            warn!(frontend_url = %frontend_url, "FRONTEND_URL is not a valid origin; allowing any");
            AllowOrigin::from(Any)
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Create the server router
pub fn create_router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/session", post(http::create_session))
        .route("/session/{session_id}", delete(http::clear_session))
        .route("/session/{session_id}/history", get(http::get_history))
        .route("/chat", post(http::chat))
        // Administration
        .route("/sessions", get(http::list_sessions))
        .route("/sessions/cleanup", post(http::cleanup_sessions))
        .route("/cache/stats", get(http::cache_stats))
        .route("/cache", delete(http::clear_cache));

    Router::new()
        .route("/health", get(http::health))
        .nest("/api", api_router)
        .route("/ws", get(ws::ws_handler))
        .fallback(http::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.frontend_url)),
        )
        .with_state(state)
}
