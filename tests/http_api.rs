// tests/http_api.rs
// REST gateway driven through the router without a listener

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use newsrag::{api::create_router, cache::MemoryStore, llm::LanguageModel, retrieval::MemoryIndex};

use common::{state_with, test_state, CountingModel, UnreachableStore};

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = create_router(test_state(CountingModel::replying("ok")).await);
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_session_chat_history_flow() {
    let model = CountingModel::replying("The incumbent won.");
    let app = create_router(test_state(model.clone()).await);

    let (status, body) = send(&app, Method::POST, "/api/session", None).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "Who won the election?", "sessionId": session_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "The incumbent won.");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/session/{session_id}/history"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["user"], "Who won the election?");
    assert_eq!(history[0]["bot"], "The incumbent won.");
    assert!(history[0]["id"].is_string());

    let (status, body) = send(&app, Method::DELETE, &format!("/api/session/{session_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session cleared successfully");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/session/{session_id}/history"),
        None,
    )
    .await;
    assert_eq!(body["history"], json!([]));
}

#[tokio::test]
async fn test_chat_requires_message_and_session() {
    let model = CountingModel::replying("unused");
    let app = create_router(test_state(model.clone()).await);

    for payload in [
        json!({ "sessionId": "s1" }),
        json!({ "message": "Hello" }),
        json!({ "message": "", "sessionId": "s1" }),
        json!({ "message": "Hello", "sessionId": "" }),
    ] {
        let (status, body) = send(&app, Method::POST, "/api/chat", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Message and sessionId are required");
    }

    // Not JSON at all
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_cache_admin_endpoints() {
    let app = create_router(test_state(CountingModel::replying("Answer.")).await);

    send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "Rates?", "sessionId": "s1" })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCachedQueries"], 1);
    assert_eq!(body["cachePrefix"], "rag_cache:");
    assert_eq!(body["cacheTTL"], 1800);

    let (status, body) = send(&app, Method::DELETE, "/api/cache", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleared"], 1);

    let (_, body) = send(&app, Method::GET, "/api/cache/stats", None).await;
    assert_eq!(body["totalCachedQueries"], 0);
}

#[tokio::test]
async fn test_session_admin_endpoints() {
    let app = create_router(test_state(CountingModel::replying("Answer.")).await);

    send(&app, Method::POST, "/api/session", None).await;
    send(&app, Method::POST, "/api/session", None).await;

    let (status, body) = send(&app, Method::GET, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 2);
    assert!(body["sessions"][0]["lastActivity"].is_string());

    let (status, body) = send(&app, Method::POST, "/api/sessions/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cleaned"], 0);
}

#[tokio::test]
async fn test_session_store_failure_is_500() {
    let state = state_with(
        Arc::new(UnreachableStore),
        Arc::new(MemoryIndex::new()),
        Some(CountingModel::replying("unused") as Arc<dyn LanguageModel>),
    );
    let app = create_router(state);

    let (status, body) = send(&app, Method::POST, "/api/session", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "Failed to create session");
    assert_eq!(body["status"], 500);
    assert_eq!(body["error_code"], "INTERNAL_ERROR");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "Hello", "sessionId": "s1" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to process message");
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let state = state_with(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryIndex::new()),
        None,
    );
    let app = create_router(state);

    let (status, body) = send(&app, Method::GET, "/api/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cors_allows_frontend_origin() {
    let app = create_router(test_state(CountingModel::replying("ok")).await);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
}
