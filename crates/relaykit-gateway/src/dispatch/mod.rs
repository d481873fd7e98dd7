//! Request dispatch adapter.
//!
//! Wraps domain handlers so every request ends in exactly one HTTP write:
//! the handler's own success envelope, or a failure envelope produced by the
//! failure router.

pub mod adapter;
pub mod exchange;
pub mod extract;

pub use adapter::{Adapted, DispatchAdapter, RequestHandler};
pub use exchange::{ExchangePhase, Responder};
pub use extract::json_body;
