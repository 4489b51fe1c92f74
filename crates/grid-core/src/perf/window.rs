use std::collections::VecDeque;

use super::BundlePerformanceSample;

/// Bounded moving average over the most recent task samples.
///
/// Invariant: `total_time / sample_count == mean()` whenever at least one
/// sample is retained. Old samples are evicted first-in first-out once the
/// retained task count exceeds `capacity`; a single sample larger than the
/// capacity is still kept on its own.
#[derive(Debug, Clone)]
pub struct PerformanceWindow {
    samples: VecDeque<BundlePerformanceSample>,
    total_time: f64,
    sample_count: u64,
    capacity: u64,
    mean: f64,
    previous_mean: f64,
}

impl PerformanceWindow {
    pub fn new(capacity: u64, initial_mean: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            total_time: 0.0,
            sample_count: 0,
            capacity: capacity.max(1),
            mean: initial_mean,
            previous_mean: initial_mean,
        }
    }

    /// Appends a sample and evicts the oldest ones beyond capacity. O(1) amortized.
    pub fn add_sample(&mut self, sample: BundlePerformanceSample) {
        if sample.samples == 0 {
            return;
        }
        self.previous_mean = self.mean;

        self.total_time += sample.total_time();
        self.sample_count += sample.samples;
        self.samples.push_back(sample);

        while self.sample_count > self.capacity && self.samples.len() > 1 {
            if let Some(old) = self.samples.pop_front() {
                self.total_time -= old.total_time();
                self.sample_count -= old.samples;
            }
        }
        if self.samples.len() == 1 {
            // resync to drop accumulated rounding error
            self.total_time = sample.total_time();
            self.sample_count = sample.samples;
        }
        self.mean = self.total_time / self.sample_count as f64;
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Mean immediately before the last [`add_sample`](Self::add_sample).
    #[inline]
    pub fn previous_mean(&self) -> f64 {
        self.previous_mean
    }

    #[inline]
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Number of task samples currently retained.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Number of feedback observations currently retained.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}
