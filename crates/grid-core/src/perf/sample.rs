/// One feedback observation: the mean time per task over `samples` tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BundlePerformanceSample {
    pub mean_time: f64,
    pub samples: u64,
}

impl BundlePerformanceSample {
    pub fn new(mean_time: f64, samples: u64) -> Self {
        Self { mean_time, samples }
    }

    /// Accumulated time carried by this sample.
    #[inline]
    pub fn total_time(&self) -> f64 {
        self.mean_time * self.samples as f64
    }
}
