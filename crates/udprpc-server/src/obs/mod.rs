//! Lightweight in-process metrics.
//!
//! Metrics are stored as atomics and rendered as Prometheus text; the server
//! logs the rendered snapshot when it shuts down.

pub mod metrics;

pub use metrics::RpcMetrics;
