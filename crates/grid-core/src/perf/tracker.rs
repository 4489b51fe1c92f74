use std::time::Duration;

use super::{BundlePerformanceSample, PerformanceWindow};

/// Round-trip statistics of one channel, fed once per completed dispatch.
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    window: PerformanceWindow,
    feedbacks: u64,
    last_size: usize,
}

impl PerformanceTracker {
    pub fn new(capacity: u64, initial_mean: f64) -> Self {
        Self {
            window: PerformanceWindow::new(capacity, initial_mean),
            feedbacks: 0,
            last_size: 0,
        }
    }

    /// Records a dispatch of `size` tasks that took `total_time` end to end.
    pub fn record(&mut self, size: usize, total_time: Duration) {
        if size == 0 {
            return;
        }
        let total_ms = total_time.as_secs_f64() * 1000.0;
        self.window.add_sample(BundlePerformanceSample::new(
            total_ms / size as f64,
            size as u64,
        ));
        self.feedbacks += 1;
        self.last_size = size;
    }

    /// Moving-average time per task, in milliseconds.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.window.mean()
    }

    #[inline]
    pub fn previous_mean(&self) -> f64 {
        self.window.previous_mean()
    }

    /// Number of dispatches fed back so far.
    #[inline]
    pub fn feedbacks(&self) -> u64 {
        self.feedbacks
    }

    #[inline]
    pub fn last_size(&self) -> usize {
        self.last_size
    }

    #[inline]
    pub fn window(&self) -> &PerformanceWindow {
        &self.window
    }
}
