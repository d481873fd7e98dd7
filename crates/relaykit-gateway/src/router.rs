//! Axum router wiring.
//!
//! Exposes the operational routes and a `NOT_FOUND` fallback. Domain routes
//! are built elsewhere and merged in with [`build_router_with`].

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    build_router_with(state, Router::new())
}

pub fn build_router_with(state: AppState, domain: Router<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .merge(domain)
        .fallback(ops::not_found)
        .with_state(state)
}
