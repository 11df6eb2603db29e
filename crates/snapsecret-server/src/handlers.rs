use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Create ────────────────────────────────────────────────────────────────────

/// `PUT /secret` with `{"secret": {...}}`. The body is taken raw so that
/// malformed JSON is reported the same way as a missing field.
pub async fn put_secret(State(state): State<AppState>, body: Bytes) -> Response {
    match state.engine.create_secret(&body).await {
        Ok(created) => Json(created).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Get ───────────────────────────────────────────────────────────────────────

pub async fn get_secret(State(state): State<AppState>, Path(secret_id): Path<String>) -> Response {
    match state.engine.get_secret(&secret_id).await {
        Ok(view) => Json(json!({ "secret": view })).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Upload ────────────────────────────────────────────────────────────────────

pub async fn upload_target(State(state): State<AppState>) -> Response {
    match state.engine.new_upload_target().await {
        Ok(target) => Json(target).into_response(),
        Err(e) => e.into_response(),
    }
}
