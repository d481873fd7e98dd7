//! relaykit core: transport-agnostic envelopes and the failure taxonomy.
//!
//! This crate defines the wire-level response shapes and the closed set of
//! status classifiers shared by the gateway and by domain handlers. It
//! carries no transport or runtime dependencies so handlers can depend on it
//! without pulling in axum or tokio.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every fallible
//! path surfaces as a [`Failure`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod envelope;
pub mod error;

pub use envelope::{ErrorPayload, ResponseEnvelope, StreamEnvelope};
/// Shared result type.
pub use error::{ClassifiedFailure, Failure, Result, StatusClassifier};
