//! Transport layer (WebSocket).
//!
//! Adapts axum WebSockets to the `StreamTransport` contract used by stream
//! sessions.

pub mod ws;

pub use ws::{accept_stream, WsTransport};
