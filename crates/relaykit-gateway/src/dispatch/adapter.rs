use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::{
    extract::Request,
    response::Response,
    routing::{on, MethodFilter, MethodRouter},
};
use futures_util::FutureExt;
use tracing::Instrument;

use relaykit_core::{Failure, Result};

use crate::dispatch::exchange::{Exchange, ExchangeSink, Responder};
use crate::failure::{router::panic_failure, FailureRouter};
use crate::obs::RuntimeMetrics;

/// A domain handler. Writes its own success through the [`Responder`];
/// returns `Err` (or panics) to fail.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, req: Request, res: Responder) -> Result<()>;
}

#[async_trait]
impl<F, Fut> RequestHandler for F
where
    F: Fn(Request, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, req: Request, res: Responder) -> Result<()> {
        (self)(req, res).await
    }
}

/// Builds [`Adapted`] handlers sharing one failure router.
#[derive(Clone)]
pub struct DispatchAdapter {
    router: FailureRouter,
    metrics: Arc<RuntimeMetrics>,
}

impl DispatchAdapter {
    pub fn new(router: FailureRouter, metrics: Arc<RuntimeMetrics>) -> Self {
        Self { router, metrics }
    }

    /// Wrap an async fn or closure.
    pub fn adapt<F, Fut>(&self, name: &'static str, handler: F) -> Adapted
    where
        F: Fn(Request, Responder) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.adapt_handler(name, handler)
    }

    pub fn adapt_handler<H: RequestHandler>(&self, name: &'static str, handler: H) -> Adapted {
        Adapted {
            name,
            handler: Arc::new(handler),
            router: self.router.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// A handler wrapped so every request gets exactly one terminal write.
#[derive(Clone)]
pub struct Adapted {
    name: &'static str,
    handler: Arc<dyn RequestHandler>,
    router: FailureRouter,
    metrics: Arc<RuntimeMetrics>,
}

impl Adapted {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the handler for one request.
    ///
    /// The handler runs in its own task so it may keep working after it has
    /// responded; the response is returned as soon as it is written. `Err`
    /// results and panics, before or after a suspension point, are routed
    /// once while the exchange is still pending and suppressed afterwards.
    pub async fn call(&self, req: Request) -> Response {
        let started = Instant::now();
        let (exchange, rx) = Exchange::open(Arc::clone(&self.metrics));
        let responder = Responder::new(Arc::clone(&exchange));

        let name = self.name;
        let handler = Arc::clone(&self.handler);
        let router = self.router.clone();
        let span = tracing::debug_span!("dispatch", handler = name, method = %req.method(), path = %req.uri().path());

        tokio::spawn(
            async move {
                let outcome = AssertUnwindSafe(handler.handle(req, responder))
                    .catch_unwind()
                    .await;

                let failure = match outcome {
                    Ok(Ok(())) if exchange.is_pending() => {
                        Some(Failure::internal("handler returned without responding"))
                    }
                    Ok(Ok(())) => None,
                    Ok(Err(failure)) => Some(failure),
                    Err(panic) => Some(panic_failure("handler", panic)),
                };

                let Some(failure) = failure else { return };
                if exchange.is_pending() {
                    router.handle(failure, ExchangeSink::new(exchange)).await;
                } else {
                    exchange.suppressed("failure_after_complete");
                    tracing::warn!(error = %failure, "handler failed after responding, failure suppressed");
                }
            }
            .instrument(span),
        );

        let response = match rx.await {
            Ok(response) => response,
            Err(_) => self
                .router
                .respond(Failure::internal("dispatch task ended without a response")),
        };

        self.metrics
            .dispatch_duration
            .observe(&[("handler", name)], started.elapsed());
        response
    }

    /// Mount as an axum method router for `filter`.
    pub fn on<S>(self, filter: MethodFilter) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        on(filter, move |req: Request| {
            let adapted = self.clone();
            async move { adapted.call(req).await }
        })
    }
}
