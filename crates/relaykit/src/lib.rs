//! Top-level facade crate for relaykit.
//!
//! Re-exports the envelope/failure types and the gateway runtime so domain
//! crates can depend on a single crate.

pub mod core {
    pub use relaykit_core::*;
}

pub mod gateway {
    pub use relaykit_gateway::*;
}

pub use relaykit_core::{Failure, ResponseEnvelope, Result, StatusClassifier, StreamEnvelope};
