//! Failure taxonomy shared across relaykit crates.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Message that replaces the detail of every unclassified failure.
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// Client-facing status classifiers (closed set, stable API).
///
/// Serialized as the SCREAMING_SNAKE_CASE name, e.g. `"NOT_FOUND"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusClassifier {
    /// Invalid input / malformed request.
    BadRequest,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Authenticated but not permitted.
    Forbidden,
    /// Resource does not exist.
    NotFound,
    /// Conflicting state.
    Conflict,
    /// Anything unexpected.
    InternalServerError,
    /// Temporarily unable to serve (draining, overloaded).
    ServiceUnavailable,
}

impl StatusClassifier {
    /// Every classifier, in status order.
    pub const ALL: [StatusClassifier; 7] = [
        StatusClassifier::BadRequest,
        StatusClassifier::Unauthorized,
        StatusClassifier::Forbidden,
        StatusClassifier::NotFound,
        StatusClassifier::Conflict,
        StatusClassifier::InternalServerError,
        StatusClassifier::ServiceUnavailable,
    ];

    /// String representation used in JSON bodies and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusClassifier::BadRequest => "BAD_REQUEST",
            StatusClassifier::Unauthorized => "UNAUTHORIZED",
            StatusClassifier::Forbidden => "FORBIDDEN",
            StatusClassifier::NotFound => "NOT_FOUND",
            StatusClassifier::Conflict => "CONFLICT",
            StatusClassifier::InternalServerError => "INTERNAL_SERVER_ERROR",
            StatusClassifier::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// Numeric HTTP status carried by this classifier.
    pub fn status_code(self) -> u16 {
        match self {
            StatusClassifier::BadRequest => 400,
            StatusClassifier::Unauthorized => 401,
            StatusClassifier::Forbidden => 403,
            StatusClassifier::NotFound => 404,
            StatusClassifier::Conflict => 409,
            StatusClassifier::InternalServerError => 500,
            StatusClassifier::ServiceUnavailable => 503,
        }
    }

    /// True for the 5xx classifiers.
    pub fn is_server_side(self) -> bool {
        self.status_code() >= 500
    }
}

impl fmt::Display for StatusClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that already knows what the client should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    pub classifier: StatusClassifier,
    pub message: String,
}

impl ClassifiedFailure {
    pub fn new(classifier: StatusClassifier, message: impl Into<String>) -> Self {
        Self {
            classifier,
            message: message.into(),
        }
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.classifier, self.message)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, Failure>;

/// Any failure raised on a request or stream path.
///
/// Domain code raises `Classified` close to the source. Everything else
/// (io, serialization, panics, library errors) is `Unclassified` and is
/// collapsed to `INTERNAL_SERVER_ERROR` by [`Failure::normalize`].
#[derive(Debug, Error)]
pub enum Failure {
    #[error("{0}")]
    Classified(ClassifiedFailure),
    #[error("unclassified: {0}")]
    Unclassified(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Failure {
    /// Raise a classified failure.
    pub fn raise(classifier: StatusClassifier, message: impl Into<String>) -> Self {
        Failure::Classified(ClassifiedFailure::new(classifier, message))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::raise(StatusClassifier::ServiceUnavailable, message)
    }

    /// Wrap an infrastructure error. Its text never reaches a client.
    pub fn internal(source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Failure::Unclassified(source.into())
    }

    /// Classifier this failure resolves to once normalized.
    pub fn classifier(&self) -> StatusClassifier {
        match self {
            Failure::Classified(c) => c.classifier,
            Failure::Unclassified(_) => StatusClassifier::InternalServerError,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Failure::Classified(_))
    }

    /// Collapse into the client-visible shape.
    pub fn normalize(self) -> ClassifiedFailure {
        match self {
            Failure::Classified(c) => c,
            Failure::Unclassified(_) => {
                ClassifiedFailure::new(StatusClassifier::InternalServerError, INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<ClassifiedFailure> for Failure {
    fn from(c: ClassifiedFailure) -> Self {
        Failure::Classified(c)
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::internal(e)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Failure::internal(e)
    }
}
