//! Canonical outbound envelopes.
//!
//! Two shapes exist:
//! - [`ResponseEnvelope`] for request/response (HTTP) bodies.
//! - [`StreamEnvelope`] for every pushed stream frame.
//!
//! Constructors are pure. The failure shape takes an [`ErrorPayload`] built
//! by the caller; nothing in here picks a classifier on its own.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::StatusClassifier;

/// `data` of a failed response: the classifier and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: StatusClassifier,
}

impl ErrorPayload {
    pub fn new(code: StatusClassifier) -> Self {
        Self { code }
    }
}

/// `{ success, message, data }`.
///
/// Fields are private so the `success`/`data` pairing cannot be broken
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope<T> {
    success: bool,
    message: String,
    data: T,
}

impl<T: Serialize> ResponseEnvelope<T> {
    /// Successful response carrying domain data.
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl ResponseEnvelope<ErrorPayload> {
    /// Failed response. `payload` is supplied by the failure router.
    pub fn failure(message: impl Into<String>, payload: ErrorPayload) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: payload,
        }
    }

    pub fn code(&self) -> StatusClassifier {
        self.data.code
    }
}

impl<T> ResponseEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

/// `{ type, hostname, timestamp, data }` pushed on a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEnvelope<T> {
    #[serde(rename = "type")]
    kind: String,
    hostname: String,
    #[serde(serialize_with = "rfc3339_millis")]
    timestamp: DateTime<Utc>,
    data: T,
}

impl<T: Serialize> StreamEnvelope<T> {
    /// Build a frame stamped with the current time.
    pub fn new(kind: impl Into<String>, hostname: impl Into<String>, data: T) -> Self {
        Self::at(kind, hostname, Utc::now(), data)
    }

    /// Build a frame with an explicit emission time.
    pub fn at(
        kind: impl Into<String>,
        hostname: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: T,
    ) -> Self {
        Self {
            kind: kind.into(),
            hostname: hostname.into(),
            timestamp,
            data,
        }
    }
}

impl<T> StreamEnvelope<T> {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

fn rfc3339_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
