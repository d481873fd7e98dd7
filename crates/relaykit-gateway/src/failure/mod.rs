//! Failure routing.
//!
//! Every failure raised by a handler or a stream producer passes through
//! [`FailureRouter`]: it is normalized into a classified failure, turned into
//! a `success: false` envelope with its HTTP status, and handed to exactly one
//! transport-specific [`Deliver`] sink (HTTP write or socket teardown).

pub mod router;

pub use router::{status_for, Deliver, DeliveryKind, FailureRouter, RoutedFailure};
