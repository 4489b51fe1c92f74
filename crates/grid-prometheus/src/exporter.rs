use std::sync::Arc;
use std::time::Duration;

use grid_core::{StatisticsRegistry, StatisticsSnapshot};
use prometheus::{GaugeVec, IntCounter, Opts, Registry, proto::MetricFamily};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ExportError;

const FIELDS: [&str; 6] = ["count", "total", "min", "max", "latest", "avg"];

/// Gauges fed from scheduler statistics snapshots.
#[derive(Clone)]
pub struct PrometheusExporter {
    registry: Registry,
    statistic: GaugeVec,
    updates: IntCounter,
}

impl PrometheusExporter {
    /// Exporter with its own registry.
    pub fn new() -> Result<Self, ExportError> {
        Self::with_registry(Registry::new())
    }

    /// Registers the gauges into an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, ExportError> {
        let statistic = GaugeVec::new(
            Opts::new("grid_statistic", "Scheduler statistic by metric and field"),
            &["metric", "field"],
        )?;
        let updates = IntCounter::new(
            "grid_statistic_updates_total",
            "Statistics snapshots applied to the gauges",
        )?;
        registry.register(Box::new(statistic.clone()))?;
        registry.register(Box::new(updates.clone()))?;
        Ok(Self {
            registry,
            statistic,
            updates,
        })
    }

    pub fn update(&self, snapshot: &StatisticsSnapshot) {
        for (name, m) in &snapshot.metrics {
            let values = [
                m.count as f64,
                m.total,
                m.min,
                m.max,
                m.latest,
                m.average(),
            ];
            for (field, value) in FIELDS.into_iter().zip(values) {
                self.statistic
                    .with_label_values(&[name.as_str(), field])
                    .set(value);
            }
        }
        self.updates.inc();
        trace!(metrics = snapshot.metrics.len(), "prometheus gauges updated");
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Refreshes the gauges from `stats` every `interval` until `token` fires.
    pub fn spawn_poller(
        &self,
        stats: Arc<StatisticsRegistry>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let exporter = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => exporter.update(&stats.snapshot()),
                }
            }
            debug!("statistics poller stopped");
        })
    }
}
