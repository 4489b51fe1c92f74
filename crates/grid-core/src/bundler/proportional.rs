use crate::{error::CoreError, perf::PerformanceTracker, stats::StatisticsRegistry};

use super::{Bundler, Profile, Stamp};

/// Sizes a slice by the channel's speed relative to the whole cluster.
///
/// `size = round(queued / nodes * (cluster_mean / channel_mean) ^ factor)`,
/// bounded by `[1, max_size]`. A channel without feedback yet gets `initial_size`.
#[derive(Debug, Clone)]
pub struct ProportionalBundler {
    factor: f64,
    initial_size: usize,
    max_size: usize,
    window_capacity: u64,
    initial_mean: f64,
    stamp: Stamp,
}

impl ProportionalBundler {
    pub const ALGORITHM: &'static str = "proportional";

    /// Reads `proportionalityFactor`, `initialSize`, `maxSize`,
    /// `performanceCacheSize` and `initialMeanTime`.
    pub fn from_profile(profile: &Profile) -> Result<Self, CoreError> {
        let factor = profile.get_f64("proportionalityFactor", 1.0)?;
        let initial_size = profile.get_usize("initialSize", 10)?;
        let max_size = profile.get_usize("maxSize", usize::MAX)?;
        let window_capacity = profile.get_u64("performanceCacheSize", 3000)?;
        let initial_mean = profile.get_f64("initialMeanTime", 1e9)?;

        if factor <= 0.0 {
            return Err(profile.invalid("proportionalityFactor"));
        }
        if initial_size == 0 {
            return Err(profile.invalid("initialSize"));
        }
        if max_size == 0 {
            return Err(profile.invalid("maxSize"));
        }
        if initial_mean <= 0.0 {
            return Err(profile.invalid("initialMeanTime"));
        }

        Ok(Self {
            factor,
            initial_size: initial_size.min(max_size),
            max_size,
            window_capacity,
            initial_mean,
            stamp: Stamp::default(),
        })
    }
}

impl Bundler for ProportionalBundler {
    fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    fn size(&self, tracker: &PerformanceTracker, stats: &StatisticsRegistry) -> usize {
        if tracker.feedbacks() == 0 {
            return self.initial_size;
        }
        let Some(cluster_mean) = stats.mean_round_trip().filter(|m| *m > 0.0) else {
            return self.initial_size;
        };
        let channel_mean = tracker.mean().max(f64::MIN_POSITIVE);
        let nodes = stats.connected_nodes().max(1) as f64;
        let share = stats.queued_tasks() as f64 / nodes;
        let relative = (cluster_mean / channel_mean).powf(self.factor);

        let size = (share * relative).round();
        if !size.is_finite() || size >= self.max_size as f64 {
            return self.max_size;
        }
        (size as usize).clamp(1, self.max_size)
    }

    fn new_tracker(&self) -> PerformanceTracker {
        PerformanceTracker::new(self.window_capacity, self.initial_mean)
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn cluster(queued: usize, nodes: usize, per_task_ms: u64) -> StatisticsRegistry {
        let stats = StatisticsRegistry::new();
        stats.task_queued(queued);
        for _ in 0..nodes {
            stats.node_connected();
        }
        let t = Duration::from_millis(per_task_ms * 10);
        stats.task_executed(t, t, 10);
        stats
    }

    #[test]
    fn starts_with_initial_size() {
        let b = ProportionalBundler::from_profile(&Profile::new().with("initialSize", 4)).unwrap();
        let tracker = b.new_tracker();
        assert_eq!(b.size(&tracker, &cluster(100, 2, 10)), 4);
    }

    #[test]
    fn average_channel_gets_fair_share() {
        let b = ProportionalBundler::from_profile(&Profile::new()).unwrap();
        let mut tracker = b.new_tracker();
        tracker.record(10, Duration::from_millis(100));
        assert_eq!(b.size(&tracker, &cluster(100, 4, 10)), 25);
    }

    #[test]
    fn faster_channel_gets_more() {
        let b = ProportionalBundler::from_profile(&Profile::new()).unwrap();
        let stats = cluster(100, 4, 10);

        let mut fast = b.new_tracker();
        fast.record(10, Duration::from_millis(50));
        let mut slow = b.new_tracker();
        slow.record(10, Duration::from_millis(200));

        assert!(b.size(&fast, &stats) > b.size(&slow, &stats));
    }

    #[test]
    fn respects_max_size() {
        let b = ProportionalBundler::from_profile(&Profile::new().with("maxSize", 7)).unwrap();
        let mut tracker = b.new_tracker();
        tracker.record(10, Duration::from_millis(100));
        assert_eq!(b.size(&tracker, &cluster(1000, 1, 10)), 7);
    }

    #[test]
    fn empty_queue_still_yields_one() {
        let b = ProportionalBundler::from_profile(&Profile::new()).unwrap();
        let mut tracker = b.new_tracker();
        tracker.record(10, Duration::from_millis(100));
        assert_eq!(b.size(&tracker, &cluster(0, 3, 10)), 1);
    }
}
