use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::MetricKind;

/// Copy of one metric at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub kind: MetricKind,
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
}

impl MetricSnapshot {
    /// `total / count`, zero when nothing was recorded.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Immutable copy of every registered metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub taken_at: SystemTime,
    pub metrics: BTreeMap<String, MetricSnapshot>,
}

impl StatisticsSnapshot {
    pub fn get(&self, name: &str) -> Option<&MetricSnapshot> {
        self.metrics.get(name)
    }

    /// Flattens into `"<metric>.<field>"` keys, including the derived `.avg`.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        for (name, m) in &self.metrics {
            out.insert(format!("{name}.count"), m.count as f64);
            out.insert(format!("{name}.total"), m.total);
            out.insert(format!("{name}.min"), m.min);
            out.insert(format!("{name}.max"), m.max);
            out.insert(format!("{name}.latest"), m.latest);
            out.insert(format!("{name}.avg"), m.average());
        }
        out
    }
}
