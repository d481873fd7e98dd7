//! Stream session state and teardown.
//!
//! `Open -> Closing -> Closed`. Any trigger calls `begin_close`; the first one
//! wins under the session lock, cancels the token (no new producer call can
//! start) and records the reason. The driver task then runs `finish_close`
//! exactly once: close the transport best-effort, mark `Closed`. Waiters on
//! `SessionHandle::closed` wake only after the session left the registry.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::failure::{Deliver, DeliveryKind, RoutedFailure};
use crate::stream::transport::StreamTransport;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// Upper bound on the best-effort `StreamTransport::close` during teardown.
pub const TRANSPORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Periodic(Duration),
    EventDriven,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Periodic(_) => "periodic",
            DeliveryMode::EventDriven => "event_driven",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The producer returned a failure.
    ProducerFailed,
    /// The peer closed the connection.
    PeerClosed,
    /// Writing a frame to the transport failed.
    WriteFailed,
    /// The event source ended.
    SourceEnded,
    /// Closed through a [`SessionHandle`].
    Cancelled,
    /// Closed by manager shutdown.
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::ProducerFailed => "producer_failed",
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::WriteFailed => "write_failed",
            CloseReason::SourceEnded => "source_ended",
            CloseReason::Cancelled => "cancelled",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

pub(crate) struct SessionCore {
    id: u64,
    kind: Arc<str>,
    mode: DeliveryMode,
    pub(crate) transport: Arc<dyn StreamTransport>,
    pub(crate) cancel: CancellationToken,
    done: CancellationToken,
    state: AtomicU8,
    reason: Mutex<Option<CloseReason>>,
}

impl SessionCore {
    pub(crate) fn new(
        id: u64,
        kind: Arc<str>,
        mode: DeliveryMode,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self {
            id,
            kind,
            mode,
            transport,
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            state: AtomicU8::new(OPEN),
            reason: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            OPEN => SessionState::Open,
            CLOSING => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }

    fn reason(&self) -> Option<CloseReason> {
        *self.reason.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enter `Closing`. Returns false if another trigger got there first.
    pub(crate) fn begin_close(&self, reason: CloseReason) -> bool {
        {
            let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                tracing::debug!(session_id = self.id, reason = reason.as_str(), "close already in progress");
                return false;
            }
            *slot = Some(reason);
            self.state.store(CLOSING, Ordering::Release);
        }
        self.cancel.cancel();
        true
    }

    /// Release the transport and mark `Closed`. Driver task only.
    pub(crate) async fn finish_close(&self) -> CloseReason {
        if self.reason().is_none() {
            self.begin_close(CloseReason::SourceEnded);
        }
        let reason = self.reason().unwrap_or(CloseReason::SourceEnded);

        match tokio::time::timeout(TRANSPORT_CLOSE_TIMEOUT, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "transport close failed"),
            Err(_) => tracing::warn!(
                timeout_ms = TRANSPORT_CLOSE_TIMEOUT.as_millis() as u64,
                "transport close timed out"
            ),
        }
        self.state.store(CLOSED, Ordering::Release);
        tracing::info!(reason = reason.as_str(), "stream session closed");
        reason
    }

    /// Wake everyone waiting in `SessionHandle::closed`.
    pub(crate) fn notify_closed(&self) {
        self.done.cancel();
    }
}

/// External handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    core: Arc<SessionCore>,
}

impl SessionHandle {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> u64 {
        self.core.id
    }

    pub fn kind(&self) -> &str {
        self.core.kind()
    }

    pub fn mode(&self) -> DeliveryMode {
        self.core.mode
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// First trigger that moved the session out of `Open`.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.core.reason()
    }

    /// Request close without waiting for teardown. Returns false when the
    /// session was already closing.
    pub fn cancel(&self) -> bool {
        self.core.begin_close(CloseReason::Cancelled)
    }

    pub(crate) fn shutdown(&self) -> bool {
        self.core.begin_close(CloseReason::Shutdown)
    }

    /// Close and wait until teardown finished.
    pub async fn close(&self) {
        self.cancel();
        self.closed().await;
    }

    /// Wait until the session reached `Closed`.
    pub async fn closed(&self) {
        self.core.done.cancelled().await;
    }
}

/// Socket sink: a routed failure drives its session into `Closing`.
/// The failure envelope is never sent as a frame.
pub(crate) struct SocketSink {
    core: Arc<SessionCore>,
}

impl SocketSink {
    pub(crate) fn new(core: Arc<SessionCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Deliver for SocketSink {
    type Output = bool;

    fn kind(&self) -> DeliveryKind {
        DeliveryKind::Stream
    }

    async fn deliver(self, routed: RoutedFailure) -> bool {
        tracing::debug!(code = %routed.envelope().code(), message = routed.envelope().message(), "closing stream on failure");
        self.core.begin_close(CloseReason::ProducerFailed)
    }
}
