//! Shared application state.
//!
//! Owns the single failure router instance and everything that routes
//! through it. Built once at startup and torn down with the server.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::dispatch::DispatchAdapter;
use crate::failure::FailureRouter;
use crate::obs::RuntimeMetrics;
use crate::stream::StreamSessionManager;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<RuntimeConfig>,
    metrics: Arc<RuntimeMetrics>,
    router: FailureRouter,
    dispatch: DispatchAdapter,
    streams: StreamSessionManager,
}

impl AppState {
    pub fn new(cfg: RuntimeConfig) -> Self {
        let metrics = Arc::new(RuntimeMetrics::default());
        let router = FailureRouter::new(Arc::clone(&metrics));
        let dispatch = DispatchAdapter::new(router.clone(), Arc::clone(&metrics));
        let streams = StreamSessionManager::new(
            router.clone(),
            Arc::clone(&metrics),
            cfg.runtime.resolved_hostname(),
            cfg.streams.max_sessions,
        );

        Self {
            cfg: Arc::new(cfg),
            metrics,
            router,
            dispatch,
            streams,
        }
    }

    pub fn cfg(&self) -> &RuntimeConfig {
        &self.cfg
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    pub fn router(&self) -> &FailureRouter {
        &self.router
    }

    pub fn dispatch(&self) -> &DispatchAdapter {
        &self.dispatch
    }

    pub fn streams(&self) -> &StreamSessionManager {
        &self.streams
    }

    pub fn default_stream_interval(&self) -> Duration {
        Duration::from_millis(self.cfg.streams.default_interval_ms)
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }

    /// Stop accepting work and close every stream session.
    pub async fn drain(&self) {
        self.metrics.set_draining();
        let timeout = Duration::from_millis(self.cfg.runtime.drain_timeout_ms);
        if tokio::time::timeout(timeout, self.streams.shutdown()).await.is_err() {
            tracing::warn!(
                remaining = self.streams.active_sessions(),
                "drain timeout elapsed with stream sessions still closing"
            );
        }
    }

    /// Extra lines for `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![(
            "relaykit_stream_sessions",
            self.streams.active_sessions() as u64,
        )]
    }
}
