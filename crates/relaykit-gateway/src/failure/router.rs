use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use relaykit_core::{ErrorPayload, Failure, ResponseEnvelope, StatusClassifier};

use crate::obs::RuntimeMetrics;

/// Which transport a failure is being delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Http,
    Stream,
}

impl DeliveryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryKind::Http => "http",
            DeliveryKind::Stream => "stream",
        }
    }
}

/// HTTP status for a classifier (same number as `StatusClassifier::status_code`).
pub fn status_for(classifier: StatusClassifier) -> StatusCode {
    match classifier {
        StatusClassifier::BadRequest => StatusCode::BAD_REQUEST,
        StatusClassifier::Unauthorized => StatusCode::UNAUTHORIZED,
        StatusClassifier::Forbidden => StatusCode::FORBIDDEN,
        StatusClassifier::NotFound => StatusCode::NOT_FOUND,
        StatusClassifier::Conflict => StatusCode::CONFLICT,
        StatusClassifier::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        StatusClassifier::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// A normalized failure ready for delivery.
#[derive(Debug, Clone)]
pub struct RoutedFailure {
    status: StatusCode,
    envelope: ResponseEnvelope<ErrorPayload>,
}

impl RoutedFailure {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn envelope(&self) -> &ResponseEnvelope<ErrorPayload> {
        &self.envelope
    }
}

impl IntoResponse for RoutedFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

/// Single-use delivery target for a routed failure.
///
/// `deliver` takes `self` by value: a sink cannot be delivered to twice.
#[async_trait]
pub trait Deliver: Send + Sized {
    type Output: Send;

    fn kind(&self) -> DeliveryKind;

    async fn deliver(self, routed: RoutedFailure) -> Self::Output;
}

/// The one place failures become client-visible envelopes.
#[derive(Clone)]
pub struct FailureRouter {
    metrics: Arc<RuntimeMetrics>,
}

impl FailureRouter {
    pub fn new(metrics: Arc<RuntimeMetrics>) -> Self {
        Self { metrics }
    }

    /// Normalize, log and count a failure, then hand it to `sink` once.
    pub async fn handle<D: Deliver>(&self, failure: Failure, sink: D) -> D::Output {
        let routed = self.route(failure, sink.kind());
        sink.deliver(routed).await
    }

    /// Route straight into an HTTP response (fallback, readiness).
    pub fn respond(&self, failure: Failure) -> Response {
        self.route(failure, DeliveryKind::Http).into_response()
    }

    fn route(&self, failure: Failure, kind: DeliveryKind) -> RoutedFailure {
        match &failure {
            Failure::Unclassified(source) => {
                tracing::error!(
                    transport = kind.as_str(),
                    error = %source,
                    "unclassified failure normalized to INTERNAL_SERVER_ERROR"
                );
            }
            Failure::Classified(c) if c.classifier.is_server_side() => {
                tracing::warn!(transport = kind.as_str(), code = %c.classifier, message = %c.message, "failure routed");
            }
            Failure::Classified(c) => {
                tracing::debug!(transport = kind.as_str(), code = %c.classifier, message = %c.message, "failure routed");
            }
        }

        let classified = failure.normalize();
        self.metrics.failures_routed.inc(&[
            ("code", classified.classifier.as_str()),
            ("transport", kind.as_str()),
        ]);

        RoutedFailure {
            status: status_for(classified.classifier),
            envelope: ResponseEnvelope::failure(
                classified.message,
                ErrorPayload::new(classified.classifier),
            ),
        }
    }
}

/// Turn a caught panic payload into an unclassified failure.
pub(crate) fn panic_failure(origin: &str, panic: Box<dyn Any + Send>) -> Failure {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    Failure::internal(format!("{origin} panicked: {detail}"))
}
