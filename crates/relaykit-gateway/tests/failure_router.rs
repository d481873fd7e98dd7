//! Failure router: classification, status mapping, single delivery.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use relaykit_core::{Failure, StatusClassifier};
use relaykit_gateway::failure::{status_for, Deliver, DeliveryKind, RoutedFailure};

/// Counts deliveries and hands the routed failure back.
struct CountingSink {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Deliver for CountingSink {
    type Output = RoutedFailure;

    fn kind(&self) -> DeliveryKind {
        DeliveryKind::Http
    }

    async fn deliver(self, routed: RoutedFailure) -> RoutedFailure {
        self.hits.fetch_add(1, Ordering::SeqCst);
        routed
    }
}

#[test]
fn status_matches_classifier_number() {
    for c in StatusClassifier::ALL {
        assert_eq!(status_for(c).as_u16(), c.status_code(), "{c}");
    }
}

#[tokio::test]
async fn classified_failure_is_delivered_once_with_its_status() {
    let (router, metrics) = common::router();

    for c in StatusClassifier::ALL {
        let hits = Arc::new(AtomicUsize::new(0));
        let routed = router
            .handle(Failure::raise(c, "boom"), CountingSink { hits: Arc::clone(&hits) })
            .await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(routed.status().as_u16(), c.status_code());
        assert_eq!(routed.envelope().code(), c);
        assert_eq!(routed.envelope().message(), "boom");
        assert!(!routed.envelope().is_success());
        assert_eq!(
            metrics
                .failures_routed
                .get(&[("code", c.as_str()), ("transport", "http")]),
            1
        );
    }
}

#[tokio::test]
async fn not_found_scenario_body() {
    let (router, _) = common::router();
    let hits = Arc::new(AtomicUsize::new(0));

    let routed = router
        .handle(Failure::not_found("missing"), CountingSink { hits })
        .await;
    let res = routed.into_response();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        common::json_body(res).await,
        json!({ "success": false, "message": "missing", "data": { "code": "NOT_FOUND" } })
    );
}

#[tokio::test]
async fn unclassified_failure_never_leaks_detail() {
    let (router, metrics) = common::router();

    let res = router.respond(Failure::internal("connection to 10.0.0.7:5432 refused"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let raw = common::text_body(res).await;
    assert!(!raw.contains("10.0.0.7"), "leaked: {raw}");
    let body: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "internal server error");
    assert_eq!(body["data"], json!({ "code": "INTERNAL_SERVER_ERROR" }));

    assert_eq!(
        metrics
            .failures_routed
            .get(&[("code", "INTERNAL_SERVER_ERROR"), ("transport", "http")]),
        1
    );
}

#[tokio::test]
async fn router_clones_share_counters() {
    let (router, metrics) = common::router();
    let other = router.clone();

    let a = router.respond(Failure::conflict("a"));
    let b = other.respond(Failure::conflict("b"));

    assert_eq!(a.status(), StatusCode::CONFLICT);
    assert_eq!(b.status(), StatusCode::CONFLICT);
    assert_eq!(common::json_body(a).await["message"], "a");
    assert_eq!(common::json_body(b).await["message"], "b");
    assert_eq!(
        metrics
            .failures_routed
            .get(&[("code", "CONFLICT"), ("transport", "http")]),
        2
    );
}
