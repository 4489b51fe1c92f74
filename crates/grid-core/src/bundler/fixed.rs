use crate::{
    error::CoreError,
    perf::{DEFAULT_INITIAL_MEAN_MS, DEFAULT_WINDOW_CAPACITY, PerformanceTracker},
    stats::StatisticsRegistry,
};

use super::{Bundler, Profile, Stamp};

/// Always answers the configured size.
#[derive(Debug, Clone)]
pub struct FixedSizeBundler {
    size: usize,
    stamp: Stamp,
}

impl FixedSizeBundler {
    pub const ALGORITHM: &'static str = "manual";

    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            stamp: Stamp::default(),
        }
    }

    /// Reads `size` (default 1).
    pub fn from_profile(profile: &Profile) -> Result<Self, CoreError> {
        let size = profile.get_usize("size", 1)?;
        if size == 0 {
            return Err(profile.invalid("size"));
        }
        Ok(Self::new(size))
    }
}

impl Bundler for FixedSizeBundler {
    fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    fn size(&self, _tracker: &PerformanceTracker, _stats: &StatisticsRegistry) -> usize {
        self.size
    }

    fn new_tracker(&self) -> PerformanceTracker {
        PerformanceTracker::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_INITIAL_MEAN_MS)
    }

    fn copy(&self) -> Box<dyn Bundler> {
        Box::new(self.clone())
    }

    fn stamp(&self) -> Stamp {
        self.stamp
    }

    fn set_stamp(&mut self, stamp: Stamp) {
        self.stamp = stamp;
    }
}
