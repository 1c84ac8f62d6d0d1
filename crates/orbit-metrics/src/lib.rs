//! Prometheus metrics backend for the refresh coordination core.
//!
//! ## Metrics
//! - `orbit_cycles_total{status}` - Counter
//! - `orbit_stage_duration_seconds{stage}` - Histogram
//! - `orbit_rate_limit_decisions_total{outcome}` - Counter
//! - `orbit_task_outcomes_total{outcome}` - Counter
//!
//! ## HTTP Server
//! This crate does NOT provide an HTTP server for the `/metrics`
//! endpoint. Expose [`CoordinationMetrics::gather`] through the
//! application's existing HTTP framework:
//!
//! ```rust,ignore
//! async fn metrics_handler(
//!     State(metrics): State<Arc<CoordinationMetrics>>
//! ) -> Response {
//!     let families = metrics.gather();
//!     let encoder = prometheus::TextEncoder::new();
//!     let mut buffer = vec![];
//!     encoder.encode(&families, &mut buffer).unwrap();
//!     Response::builder()
//!         .header("Content-Type", encoder.format_type())
//!         .body(buffer.into())
//!         .unwrap()
//! }
//! ```

mod backend;
pub use backend::CoordinationMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
