// src/api/http.rs
// REST handlers for sessions, chat and cache administration

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult, IntoApiError};
use crate::pipeline::CacheStats;
use crate::session::run_cleanup_cycle;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub session_id: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

pub async fn create_session(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let session_id = Uuid::new_v4().to_string();
    state
        .sessions
        .create_session(&session_id)
        .await
        .into_api_error("Failed to create session")?;

    Ok(Json(json!({ "sessionId": session_id })))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let history = state
        .sessions
        .get_session_history(&session_id)
        .await
        .into_api_error("Failed to fetch session history")?;

    Ok(Json(json!({ "history": history })))
}

pub async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .sessions
        .clear_session(&session_id)
        .await
        .into_api_error("Failed to clear session")?;

    Ok(Json(json!({ "message": "Session cleared successfully" })))
}

pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let (Some(message), Some(session_id)) = (required(request.message), required(request.session_id))
    else {
        return Err(ApiError::bad_request("Message and sessionId are required"));
    };

    let turn = state
        .orchestrator
        .chat(&message, &session_id)
        .await
        .into_api_error("Failed to process message")?;

    Ok(Json(json!({ "response": turn.bot })))
}

pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let sessions = state
        .sessions
        .list_active_sessions()
        .await
        .into_api_error("Failed to list sessions")?;

    Ok(Json(json!({
        "count": sessions.len(),
        "sessions": sessions
    })))
}

pub async fn cleanup_sessions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let cleaned = run_cleanup_cycle(&state.sessions)
        .await
        .into_api_error("Failed to clean up sessions")?;

    info!(cleaned, "Manual session cleanup finished");
    Ok(Json(json!({ "cleaned": cleaned })))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.orchestrator.cache_stats().await)
}

pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let cleared = state
        .orchestrator
        .clear_cache()
        .await
        .into_api_error("Failed to clear cache")?;

    Ok(Json(json!({ "cleared": cleared })))
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        assert_eq!(required(None), None);
        assert_eq!(required(Some(String::new())), None);
        assert_eq!(required(Some("hi".to_string())), Some("hi".to_string()));
    }

    #[test]
    fn test_chat_request_camel_case() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"message":"Hello","sessionId":"s1"}"#).unwrap();
        assert_eq!(request.message.as_deref(), Some("Hello"));
        assert_eq!(request.session_id.as_deref(), Some("s1"));
    }
}
