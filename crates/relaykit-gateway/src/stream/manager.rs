use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, FutureExt};
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use tracing::Instrument;

use relaykit_core::{Failure, Result, StreamEnvelope};

use crate::failure::{router::panic_failure, FailureRouter};
use crate::obs::RuntimeMetrics;
use crate::stream::registry::SessionRegistry;
use crate::stream::session::{CloseReason, DeliveryMode, SessionCore, SessionHandle, SocketSink};
use crate::stream::source::{ticks, Tick};
use crate::stream::transport::StreamTransport;

/// Opens, drives and tears down push-style stream sessions.
#[derive(Clone)]
pub struct StreamSessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    router: FailureRouter,
    metrics: Arc<RuntimeMetrics>,
    hostname: Arc<str>,
    max_sessions: usize,
    /// Admission slots held by live sessions, released after registry removal.
    reserved: AtomicUsize,
    registry: SessionRegistry,
}

impl ManagerInner {
    /// Take one admission slot, or fail when the limit is reached.
    fn reserve(&self) -> Result<()> {
        let max = self.max_sessions;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (max == 0 || n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| Failure::unavailable("stream session limit reached"))
    }

    fn release(&self) {
        self.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

impl StreamSessionManager {
    /// `max_sessions == 0` disables the admission limit.
    pub fn new(
        router: FailureRouter,
        metrics: Arc<RuntimeMetrics>,
        hostname: impl Into<Arc<str>>,
        max_sessions: usize,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                router,
                metrics,
                hostname: hostname.into(),
                max_sessions,
                reserved: AtomicUsize::new(0),
                registry: SessionRegistry::new(),
            }),
        }
    }

    pub fn router(&self) -> &FailureRouter {
        &self.inner.router
    }

    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn session(&self, id: u64) -> Option<SessionHandle> {
        self.inner.registry.get(id)
    }

    /// Check capacity for one more session without reserving it. Opening
    /// still reserves atomically, so this is only an early answer (e.g.
    /// before a WebSocket upgrade).
    pub fn admit(&self) -> Result<()> {
        let max = self.inner.max_sessions;
        if max > 0 && self.inner.reserved.load(Ordering::Acquire) >= max {
            return Err(Failure::unavailable("stream session limit reached"));
        }
        Ok(())
    }

    /// Invoke `producer` every `interval` and push each result as a `kind`
    /// frame until the session closes.
    pub fn open_periodic<F, Fut, T>(
        &self,
        transport: Arc<dyn StreamTransport>,
        kind: impl Into<Arc<str>>,
        interval: Duration,
        producer: F,
    ) -> Result<SessionHandle>
    where
        F: FnMut(Tick) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        if interval.is_zero() {
            return Err(Failure::bad_request("stream interval must be greater than zero"));
        }
        self.open(
            transport,
            kind.into(),
            DeliveryMode::Periodic(interval),
            ticks(interval),
            producer,
        )
    }

    /// Invoke `producer` once per event from `source` and push each result as
    /// a `kind` frame until the session closes or the source ends.
    pub fn open_event_driven<E, S, F, Fut, T>(
        &self,
        transport: Arc<dyn StreamTransport>,
        kind: impl Into<Arc<str>>,
        source: S,
        producer: F,
    ) -> Result<SessionHandle>
    where
        E: Send + 'static,
        S: Stream<Item = E> + Send + 'static,
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.open(transport, kind.into(), DeliveryMode::EventDriven, source, producer)
    }

    /// Close every live session and wait for their teardown.
    pub async fn shutdown(&self) {
        let sessions = self.inner.registry.snapshot();
        tracing::info!(count = sessions.len(), "closing stream sessions");
        for s in &sessions {
            s.shutdown();
        }
        join_all(sessions.iter().map(|s| s.closed())).await;
    }

    fn open<E, S, F, Fut, T>(
        &self,
        transport: Arc<dyn StreamTransport>,
        kind: Arc<str>,
        mode: DeliveryMode,
        source: S,
        producer: F,
    ) -> Result<SessionHandle>
    where
        E: Send + 'static,
        S: Stream<Item = E> + Send + 'static,
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.inner.reserve()?;

        let id = self.inner.registry.next_id();
        let core = Arc::new(SessionCore::new(id, kind, mode, transport));
        let handle = SessionHandle::new(Arc::clone(&core));
        self.inner.registry.insert(handle.clone());
        self.inner
            .metrics
            .stream_sessions_active
            .inc(&[("mode", mode.as_str())]);

        let span = tracing::info_span!("stream", session_id = id, kind = %core.kind(), mode = mode.as_str());
        span.in_scope(|| tracing::info!("stream session opened"));

        let driver = Driver {
            core,
            manager: Arc::clone(&self.inner),
        };
        tokio::spawn(driver.run(source, producer).instrument(span));
        Ok(handle)
    }
}

struct Driver {
    core: Arc<SessionCore>,
    manager: Arc<ManagerInner>,
}

impl Driver {
    /// One producer invocation in flight at a time; the state is checked
    /// before every invocation and before every write. Both the producer
    /// call and the write are raced against cancel and peer close.
    async fn run<E, S, F, Fut, T>(self, source: S, mut producer: F)
    where
        S: Stream<Item = E> + Send,
        F: FnMut(E) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Serialize + Send,
    {
        let core = &self.core;
        let mut source = Box::pin(source);

        loop {
            let event = tokio::select! {
                biased;
                _ = core.cancel.cancelled() => break,
                _ = core.transport.closed() => {
                    core.begin_close(CloseReason::PeerClosed);
                    break;
                }
                next = source.next() => match next {
                    Some(event) => event,
                    None => {
                        core.begin_close(CloseReason::SourceEnded);
                        break;
                    }
                },
            };

            if !core.is_open() {
                break;
            }

            let call = match catch_unwind(AssertUnwindSafe(|| producer(event))) {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind(),
                Err(panic) => {
                    self.fail(panic_failure("producer", panic)).await;
                    break;
                }
            };

            let produced = tokio::select! {
                biased;
                _ = core.cancel.cancelled() => break,
                _ = core.transport.closed() => {
                    core.begin_close(CloseReason::PeerClosed);
                    break;
                }
                produced = call => produced.unwrap_or_else(|panic| Err(panic_failure("producer", panic))),
            };

            let data = match produced {
                Ok(data) => data,
                Err(failure) => {
                    self.fail(failure).await;
                    break;
                }
            };

            if !core.is_open() {
                break;
            }

            let frame = StreamEnvelope::new(core.kind(), &*self.manager.hostname, data);
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    self.fail(e.into()).await;
                    break;
                }
            };

            // a peer that stops reading must not hold the session open
            let written = tokio::select! {
                biased;
                _ = core.cancel.cancelled() => break,
                _ = core.transport.closed() => {
                    core.begin_close(CloseReason::PeerClosed);
                    break;
                }
                written = core.transport.write(text) => written,
            };
            if let Err(e) = written {
                tracing::warn!(error = %e, "stream write failed");
                core.begin_close(CloseReason::WriteFailed);
                break;
            }
            self.manager
                .metrics
                .stream_frames_sent
                .inc(&[("type", core.kind())]);
        }

        // drop the subscription before touching the transport
        drop(source);
        let reason = core.finish_close().await;

        let mode = core.mode().as_str();
        self.manager.registry.remove(core.id());
        self.manager.release();
        self.manager.metrics.stream_sessions_active.dec(&[("mode", mode)]);
        self.manager
            .metrics
            .stream_sessions_closed
            .inc(&[("mode", mode), ("reason", reason.as_str())]);
        core.notify_closed();
    }

    async fn fail(&self, failure: Failure) {
        self.manager
            .router
            .handle(failure, SocketSink::new(Arc::clone(&self.core)))
            .await;
    }
}
