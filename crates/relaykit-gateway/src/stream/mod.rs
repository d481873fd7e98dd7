//! Stream session manager (push-style delivery).
//!
//! A session owns one transport and one producer. Every successful producer
//! result is wrapped in a `StreamEnvelope` and written as a text frame.
//! Whatever ends the session first (producer failure, peer close, cancel)
//! tears it down exactly once.
//!
//! Policy for ambiguous producer behavior:
//! - one producer call yields one outcome (`Ok` frame or `Err` close), so a
//!   tick cannot both emit and fail;
//! - events are not deduplicated; they queue in the source and are consumed
//!   strictly one at a time.

pub mod manager;
pub mod registry;
pub mod session;
pub mod source;
pub mod transport;

pub use manager::StreamSessionManager;
pub use registry::SessionRegistry;
pub use session::{
    CloseReason, DeliveryMode, SessionHandle, SessionState, TRANSPORT_CLOSE_TIMEOUT,
};
pub use source::{broadcast_source, channel_source, ticks, Tick, MIN_TICK_PERIOD};
pub use transport::{CloseTransport, StreamTransport};
