//! HTTP 边界（feature `web`）
//!
//! - GET  /health          -> {"status": "healthy"}
//! - POST /v1/chat         -> {"query"} 跑一次 Run，返回 RunOutcome
//! - POST /v1/preferences  -> 写入一条偏好记忆（启用感知时附带结构化偏好）
//! - GET  /v1/preferences  -> 列出全部记忆
//! - DELETE /v1/preferences -> 清空记忆，返回移除条数
//!
//! 所有请求共享同一个 AgentComponents（其中 MemoryStore 为进程级）。

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::AgentComponents;
use crate::memory::MemoryItem;
use crate::perception::PreferencesOutput;

pub struct AppState {
    pub components: AgentComponents,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceRequest {
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

/// 写入结果：记忆条目本身，附带（启用感知时）抽取出的结构化偏好
#[derive(Debug, Serialize)]
pub struct StoredPreference {
    #[serde(flatten)]
    pub item: MemoryItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<PreferencesOutput>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
        .route("/v1/chat", post(chat))
        .route(
            "/v1/preferences",
            get(list_preferences).post(store_preference).delete(clear_preferences),
        )
        .with_state(state)
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let Some(query) = req.query.filter(|q| !q.trim().is_empty()) else {
        return bad_request("No query provided");
    };
    tracing::info!(query = %query, "chat request");

    match state.components.process_query(&query).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "chat request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "error_kind": e.kind() })),
            )
                .into_response()
        }
    }
}

async fn store_preference(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PreferenceRequest>,
) -> Response {
    let Some(fact) = req.preferences.filter(|p| !p.trim().is_empty()) else {
        return bad_request("No preferences provided");
    };
    let (item, structured) = state
        .components
        .store_preference(&fact, req.importance, req.source)
        .await;
    (StatusCode::OK, Json(StoredPreference { item, structured })).into_response()
}

async fn list_preferences(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "preferences": state.components.memory.list() }))
}

async fn clear_preferences(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "cleared": state.components.memory.clear() }))
}
