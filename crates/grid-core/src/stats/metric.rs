use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::MetricSnapshot;

/// How a metric interprets the values it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    /// Independent observations (durations); `latest` is the last per-item value.
    Sample,
    /// A level moved up and down by deltas (queue depth, connections); `latest` is the current level.
    Level,
}

/// `f64` stored as bits in an `AtomicU64`.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release);
    }

    /// Applies `f` atomically and returns the new value.
    fn update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return f64::from_bits(next),
                Err(seen) => current = seen,
            }
        }
    }
}

/// Lock-free accumulator of {count, total, min, max, latest}.
#[derive(Debug)]
pub struct Metric {
    name: &'static str,
    kind: MetricKind,
    count: AtomicU64,
    total: AtomicF64,
    min: AtomicF64,
    max: AtomicF64,
    latest: AtomicF64,
}

impl Metric {
    pub fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            count: AtomicU64::new(0),
            total: AtomicF64::new(0.0),
            min: AtomicF64::new(f64::INFINITY),
            max: AtomicF64::new(f64::NEG_INFINITY),
            latest: AtomicF64::new(0.0),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Adds `accumulated` spread over `count` items.
    pub fn record(&self, accumulated: f64, count: u64) {
        if count == 0 {
            return;
        }
        let per_item = accumulated / count as f64;
        self.count.fetch_add(count, Ordering::AcqRel);
        self.total.update(|t| t + accumulated);
        self.latest.store(per_item);
        self.track_bounds(per_item);
    }

    /// Moves a level metric by `delta`.
    pub fn adjust(&self, delta: f64) {
        let level = self.latest.update(|l| l + delta);
        self.count.fetch_add(1, Ordering::AcqRel);
        if delta > 0.0 {
            self.total.update(|t| t + delta);
        }
        self.track_bounds(level);
    }

    /// Current level of a [`MetricKind::Level`] metric, or last value of a sample metric.
    #[inline]
    pub fn latest(&self) -> f64 {
        self.latest.load()
    }

    /// Running average of a sample metric, `None` before the first value.
    pub fn average(&self) -> Option<f64> {
        let count = self.count.load(Ordering::Acquire);
        (count > 0).then(|| self.total.load() / count as f64)
    }

    /// Clears accumulated values; a level metric keeps its current level.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
        self.total.store(0.0);
        match self.kind {
            MetricKind::Sample => {
                self.latest.store(0.0);
                self.min.store(f64::INFINITY);
                self.max.store(f64::NEG_INFINITY);
            }
            MetricKind::Level => {
                let level = self.latest.load();
                self.min.store(level);
                self.max.store(level);
            }
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let count = self.count.load(Ordering::Acquire);
        let min = self.min.load();
        let max = self.max.load();
        MetricSnapshot {
            kind: self.kind,
            count,
            total: self.total.load(),
            min: if min.is_finite() { min } else { 0.0 },
            max: if max.is_finite() { max } else { 0.0 },
            latest: self.latest.load(),
        }
    }

    fn track_bounds(&self, value: f64) {
        self.min.update(|m| m.min(value));
        self.max.update(|m| m.max(value));
    }
}
