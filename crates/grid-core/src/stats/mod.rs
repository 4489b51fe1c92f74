//! Process-wide scheduler statistics.
//!
//! Each metric is an independent set of atomics, so writers from many channels
//! never contend on a shared lock. Readers get an immutable
//! [`StatisticsSnapshot`] copied field by field.

mod metric;
pub use metric::{Metric, MetricKind};

mod registry;
pub use registry::StatisticsRegistry;

/// Metric names as they appear in snapshots.
pub mod names {
    pub use super::registry::{
        CLIENTS, DISPATCHES, EXECUTION, EXPIRATIONS, JOBS, NODES, QUEUE_SIZE, QUEUE_TIME,
        ROUND_TRIP, TRANSPORT,
    };
}

mod snapshot;
pub use snapshot::{MetricSnapshot, StatisticsSnapshot};
