//! Failure classification and normalization.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::error::Error as _;

use relaykit_core::error::INTERNAL_MESSAGE;
use relaykit_core::{ClassifiedFailure, Failure, StatusClassifier};

#[test]
fn classifier_status_mapping_is_fixed() {
    let got: Vec<(&str, u16)> = StatusClassifier::ALL
        .iter()
        .map(|c| (c.as_str(), c.status_code()))
        .collect();

    assert_eq!(
        got,
        vec![
            ("BAD_REQUEST", 400),
            ("UNAUTHORIZED", 401),
            ("FORBIDDEN", 403),
            ("NOT_FOUND", 404),
            ("CONFLICT", 409),
            ("INTERNAL_SERVER_ERROR", 500),
            ("SERVICE_UNAVAILABLE", 503),
        ]
    );
}

#[test]
fn classifier_serializes_as_name() {
    for c in StatusClassifier::ALL {
        let s = serde_json::to_string(&c).unwrap();
        assert_eq!(s, format!("\"{}\"", c.as_str()));
    }
}

#[test]
fn classified_failure_passes_through_normalize() {
    let f = Failure::raise(StatusClassifier::NotFound, "missing");
    assert!(f.is_classified());
    assert_eq!(f.classifier(), StatusClassifier::NotFound);
    assert_eq!(
        f.normalize(),
        ClassifiedFailure::new(StatusClassifier::NotFound, "missing")
    );
}

#[test]
fn shorthands_pick_their_classifier() {
    let cases = [
        (Failure::bad_request("a"), StatusClassifier::BadRequest),
        (Failure::unauthorized("a"), StatusClassifier::Unauthorized),
        (Failure::forbidden("a"), StatusClassifier::Forbidden),
        (Failure::not_found("a"), StatusClassifier::NotFound),
        (Failure::conflict("a"), StatusClassifier::Conflict),
        (Failure::unavailable("a"), StatusClassifier::ServiceUnavailable),
    ];
    for (f, want) in cases {
        assert_eq!(f.classifier(), want);
    }
}

#[test]
fn unclassified_failure_hides_detail() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk /dev/sda1 exploded");
    let f: Failure = io.into();

    assert!(!f.is_classified());
    assert_eq!(f.classifier(), StatusClassifier::InternalServerError);
    // detail stays available for logs
    assert!(f.to_string().contains("disk /dev/sda1 exploded"));
    assert!(f.source().is_some());

    let n = f.normalize();
    assert_eq!(n.classifier, StatusClassifier::InternalServerError);
    assert_eq!(n.message, INTERNAL_MESSAGE);
    assert!(!n.message.contains("sda1"));
}

#[test]
fn serde_errors_are_unclassified() {
    let err = serde_json::from_str::<u32>("not json").unwrap_err();
    let f: Failure = err.into();
    assert_eq!(f.normalize().message, INTERNAL_MESSAGE);
}

#[test]
fn internal_accepts_plain_strings() {
    let f = Failure::internal("pool exhausted: 17 waiters");
    assert_eq!(f.classifier(), StatusClassifier::InternalServerError);
    assert!(!f.normalize().message.contains("pool"));
}
