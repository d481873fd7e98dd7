//! Lightweight in-process metrics.
//!
//! Counters, gauges and a latency histogram kept as atomics and rendered by
//! the `/metrics` handler in Prometheus text format.

pub mod metrics;

pub use metrics::RuntimeMetrics;
