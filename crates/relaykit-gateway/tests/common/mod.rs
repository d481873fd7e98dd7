//! Shared fixtures: in-memory stream transport and response helpers.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use relaykit_core::{Failure, Result};
use relaykit_gateway::failure::FailureRouter;
use relaykit_gateway::obs::RuntimeMetrics;
use relaykit_gateway::stream::{SessionHandle, StreamSessionManager, StreamTransport};

pub const HOST: &str = "node-test";

#[derive(Default)]
pub struct MemoryTransport {
    frames: Mutex<Vec<String>>,
    close_calls: AtomicUsize,
    fail_writes: AtomicBool,
    peer: CancellationToken,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_writes() -> Arc<Self> {
        let t = Self::default();
        t.fail_writes.store(true, Ordering::SeqCst);
        Arc::new(t)
    }

    pub fn frames(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Simulate the remote side hanging up.
    pub fn peer_close(&self) {
        self.peer.cancel();
    }
}

#[async_trait]
impl StreamTransport for MemoryTransport {
    async fn write(&self, frame: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Failure::internal("broken pipe"));
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn closed(&self) {
        self.peer.cancelled().await;
    }
}

/// Transport whose writes never complete, like a peer that stopped reading.
/// `close` can be made to hang as well.
#[derive(Default)]
pub struct StuckTransport {
    writes_started: AtomicUsize,
    close_calls: AtomicUsize,
    hang_on_close: bool,
    peer: CancellationToken,
}

impl StuckTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hanging_close() -> Arc<Self> {
        Arc::new(Self {
            hang_on_close: true,
            ..Self::default()
        })
    }

    pub fn writes_started(&self) -> usize {
        self.writes_started.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn peer_close(&self) {
        self.peer.cancel();
    }
}

#[async_trait]
impl StreamTransport for StuckTransport {
    async fn write(&self, _frame: String) -> Result<()> {
        self.writes_started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn closed(&self) {
        self.peer.cancelled().await;
    }
}

pub fn router() -> (FailureRouter, Arc<RuntimeMetrics>) {
    let metrics = Arc::new(RuntimeMetrics::default());
    (FailureRouter::new(Arc::clone(&metrics)), metrics)
}

pub fn manager(max_sessions: usize) -> (StreamSessionManager, Arc<RuntimeMetrics>) {
    let (router, metrics) = router();
    (
        StreamSessionManager::new(router, Arc::clone(&metrics), HOST, max_sessions),
        metrics,
    )
}

/// Wait for teardown, failing the test instead of hanging.
pub async fn closed_within(handle: &SessionHandle, limit: Duration) {
    tokio::time::timeout(limit, handle.closed())
        .await
        .expect("session did not close in time");
}

pub async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
