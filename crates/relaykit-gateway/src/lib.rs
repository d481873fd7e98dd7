//! relaykit gateway library entry.
//!
//! Wires the failure router, the request dispatch adapter, the stream session
//! manager and the WebSocket transport into one runtime. Consumed by the
//! binary (`main.rs`), by domain crates that register handlers, and by
//! integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod failure;
pub mod obs;
pub mod ops;
pub mod router;
pub mod stream;
pub mod transport;
