//! Prometheus export of grid scheduler statistics.
//!
//! [`PrometheusExporter`] mirrors a [`grid_core::StatisticsSnapshot`] into one
//! gauge family; [`PrometheusExporter::spawn_poller`] refreshes it on the
//! configured statistics interval.
//!
//! ## Metrics
//! - `grid_statistic{metric, field}` - Gauge, one series per metric and field
//!   (`count`, `total`, `min`, `max`, `latest`, `avg`)
//! - `grid_statistic_updates_total` - Counter of applied snapshots
//!
//! ## HTTP Server
//! No `/metrics` endpoint is provided; encode [`PrometheusExporter::gather`]
//! with [`TextEncoder`] in whatever server the process already runs.

mod error;
pub use error::ExportError;

mod exporter;
pub use exporter::PrometheusExporter;

pub use prometheus::{Encoder, Registry, TextEncoder};
