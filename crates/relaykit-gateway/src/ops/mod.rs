//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 envelope when draining)
//! - `/metrics` : Prometheus text format
//!
//! Unknown paths fall back to a `NOT_FOUND` envelope.

use axum::{
    extract::{OriginalUri, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use relaykit_core::{Failure, ResponseEnvelope};

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    Json(ResponseEnvelope::success("ok", json!({ "status": "ok" })))
}

pub async fn readyz(State(state): State<AppState>) -> Response {
    if state.is_draining() {
        state.router().respond(Failure::unavailable("draining"))
    } else {
        Json(ResponseEnvelope::success("ready", json!({ "status": "ready" }))).into_response()
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn not_found(State(state): State<AppState>, OriginalUri(uri): OriginalUri) -> Response {
    state
        .router()
        .respond(Failure::not_found(format!("no route for {}", uri.path())))
}
