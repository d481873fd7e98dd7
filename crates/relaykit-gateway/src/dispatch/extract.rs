//! Request body helpers for adapted handlers.

use axum::extract::Request;
use serde::de::DeserializeOwned;

use relaykit_core::{Failure, Result};

/// Largest body `json_body` will buffer.
pub const MAX_JSON_BODY_BYTES: usize = 1024 * 1024;

/// Parse the request body as JSON. Malformed or oversized bodies are
/// `BAD_REQUEST` with a fixed message; parser detail is only logged.
pub async fn json_body<T: DeserializeOwned>(req: Request) -> Result<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_BYTES)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "request body rejected");
            Failure::bad_request("request body too large or unreadable")
        })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(error = %e, "request body is not valid json");
        Failure::bad_request("invalid json body")
    })
}
