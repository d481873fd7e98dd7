//! Per-request write-once exchange.
//!
//! `Pending -> {Succeeded | Failed} -> Completed`. Leaving `Pending` is a
//! single compare-and-swap; whoever loses it (a late success, a late failure)
//! is dropped and counted, never written.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tokio::sync::oneshot;

use relaykit_core::{Failure, ResponseEnvelope, Result};

use crate::failure::{Deliver, DeliveryKind, RoutedFailure};
use crate::obs::RuntimeMetrics;

const PENDING: u8 = 0;
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;
const COMPLETED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Pending,
    Succeeded,
    Failed,
    Completed,
}

pub(crate) struct Exchange {
    phase: AtomicU8,
    slot: Mutex<Option<oneshot::Sender<Response>>>,
    metrics: Arc<RuntimeMetrics>,
}

impl Exchange {
    pub(crate) fn open(metrics: Arc<RuntimeMetrics>) -> (Arc<Self>, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let exchange = Arc::new(Self {
            phase: AtomicU8::new(PENDING),
            slot: Mutex::new(Some(tx)),
            metrics,
        });
        (exchange, rx)
    }

    pub(crate) fn phase(&self) -> ExchangePhase {
        match self.phase.load(Ordering::Acquire) {
            PENDING => ExchangePhase::Pending,
            SUCCEEDED => ExchangePhase::Succeeded,
            FAILED => ExchangePhase::Failed,
            _ => ExchangePhase::Completed,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PENDING
    }

    pub(crate) fn suppressed(&self, cause: &'static str) {
        self.metrics.suppressed_writes.inc(&[("cause", cause)]);
    }

    /// Move out of `Pending` into `to` and write `response`. Returns false
    /// (and writes nothing) if the exchange already left `Pending`.
    fn complete(&self, to: u8, response: Response, cause: &'static str) -> bool {
        if self
            .phase
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.suppressed(cause);
            tracing::warn!(cause, "response already written, dropping second write");
            return false;
        }

        let tx = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            // receiver is gone when the client disconnected first
            let _ = tx.send(response);
        }
        self.phase.store(COMPLETED, Ordering::Release);
        true
    }
}

/// Handle a request handler uses to write its success envelope.
///
/// Cloneable so background work spawned by the handler can hold it; only the
/// first write through any clone reaches the client.
#[derive(Clone)]
pub struct Responder {
    exchange: Arc<Exchange>,
}

impl Responder {
    pub(crate) fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }

    /// `200 OK` with a success envelope.
    pub fn ok<T: Serialize>(&self, message: impl Into<String>, data: T) -> Result<()> {
        self.send(StatusCode::OK, message, data)
    }

    /// `201 Created` with a success envelope.
    pub fn created<T: Serialize>(&self, message: impl Into<String>, data: T) -> Result<()> {
        self.send(StatusCode::CREATED, message, data)
    }

    /// Write a success envelope with a 2xx status.
    ///
    /// A write after the exchange completed is dropped and returns `Ok`.
    /// Non-2xx statuses and unserializable data are returned as failures so
    /// the adapter routes them instead.
    pub fn send<T: Serialize>(
        &self,
        status: StatusCode,
        message: impl Into<String>,
        data: T,
    ) -> Result<()> {
        if !status.is_success() {
            return Err(Failure::internal(format!(
                "success envelope written with non-2xx status {status}"
            )));
        }
        let body = serde_json::to_vec(&ResponseEnvelope::success(message, data))?;
        let response = (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();

        self.exchange
            .complete(SUCCEEDED, response, "success_after_complete");
        Ok(())
    }

    pub fn phase(&self) -> ExchangePhase {
        self.exchange.phase()
    }

    pub fn is_completed(&self) -> bool {
        !self.exchange.is_pending()
    }
}

/// HTTP delivery sink bound to one exchange.
pub(crate) struct ExchangeSink {
    exchange: Arc<Exchange>,
}

impl ExchangeSink {
    pub(crate) fn new(exchange: Arc<Exchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl Deliver for ExchangeSink {
    /// Whether the failure was the terminal write.
    type Output = bool;

    fn kind(&self) -> DeliveryKind {
        DeliveryKind::Http
    }

    async fn deliver(self, routed: RoutedFailure) -> bool {
        self.exchange
            .complete(FAILED, routed.into_response(), "failure_after_complete")
    }
}
