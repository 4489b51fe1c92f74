use std::time::Duration;

use tracing::debug;

use crate::{
    error::CoreError,
    perf::{DEFAULT_INITIAL_MEAN_MS, DEFAULT_WINDOW_CAPACITY, PerformanceTracker},
    stats::StatisticsRegistry,
};

use super::{Bundler, Profile, Stamp};

/// Grows the slice while the channel's time per task falls, shrinks it while it rises.
///
/// With `r = (previous_mean - mean) / previous_mean`:
/// - `|r| <= tolerance`: size unchanged;
/// - otherwise the size moves by `clamp(round(size * gain * |r|), 1, max_step)`,
///   up when `r > 0` and down when `r < 0`, then is clamped to `[min_size, max_size]`.
///
/// The next size depends only on the current size and the two latest means.
/// Feeding identical samples makes the two means equal, which is a fixed point.
#[derive(Debug, Clone)]
pub struct AdaptiveBundler {
    min_size: usize,
    max_size: usize,
    max_step: usize,
    gain: f64,
    tolerance: f64,
    window_capacity: u64,
    initial_mean: f64,
    bundle_size: usize,
    stamp: Stamp,
}

impl AdaptiveBundler {
    pub const ALGORITHM: &'static str = "adaptive";

    /// Reads `minSize`, `maxSize`, `initialSize`, `maxStep`, `gain`, `tolerance`,
    /// `performanceCacheSize` and `initialMeanTime`.
    pub fn from_profile(profile: &Profile) -> Result<Self, CoreError> {
        let min_size = profile.get_usize("minSize", 1)?;
        let max_size = profile.get_usize("maxSize", 1000)?;
        let initial_size = profile.get_usize("initialSize", min_size)?;
        let max_step = profile.get_usize("maxStep", 20)?;
        let gain = profile.get_f64("gain", 1.0)?;
        let tolerance = profile.get_f64("tolerance", 0.02)?;
        let window_capacity = profile.get_u64("performanceCacheSize", DEFAULT_WINDOW_CAPACITY)?;
        let initial_mean = profile.get_f64("initialMeanTime", DEFAULT_INITIAL_MEAN_MS)?;

        if min_size == 0 {
            return Err(profile.invalid("minSize"));
        }
        if max_size < min_size {
            return Err(profile.invalid("maxSize"));
        }
        if max_step == 0 {
            return Err(profile.invalid("maxStep"));
        }
        if gain <= 0.0 {
            return Err(profile.invalid("gain"));
        }
        if tolerance < 0.0 {
            return Err(profile.invalid("tolerance"));
        }
        if initial_mean <= 0.0 {
            return Err(profile.invalid("initialMeanTime"));
        }

        Ok(Self {
            min_size,
            max_size,
            max_step,
            gain,
            tolerance,
            window_capacity,
            initial_mean,
            bundle_size: initial_size.clamp(min_size, max_size),
            stamp: Stamp::default(),
        })
    }

    /// The control law: size after observing `mean` following `previous`.
    pub fn next_size(&self, current: usize, mean: f64, previous: f64) -> usize {
        if previous <= 0.0 || !mean.is_finite() || !previous.is_finite() {
            return current.clamp(self.min_size, self.max_size);
        }
        let r = (previous - mean) / previous;
        if r.abs() <= self.tolerance {
            return current.clamp(self.min_size, self.max_size);
        }
        let step = ((current as f64) * self.gain * r.abs()).round() as usize;
        let step = step.clamp(1, self.max_step);
        let next = if r > 0.0 {
            current.saturating_add(step)
        } else {
            current.saturating_sub(step)
        };
        next.clamp(self.min_size, self.max_size)
    }

    #[inline]
    pub fn current_size(&self) -> usize {
        self.bundle_size
    }
}

impl Bundler for AdaptiveBundler {
    fn algorithm(&self) -> &'static str {
        Self::ALGORITHM
    }

    fn size(&self, _tracker: &PerformanceTracker, _stats: &StatisticsRegistry) -> usize {
        self.bundle_size
    }

    fn feedback(&mut self, tracker: &mut PerformanceTracker, size: usize, total_time: Duration) {
        tracker.record(size, total_time);
        let next = self.next_size(self.bundle_size, tracker.mean(), tracker.previous_mean());
        if next != self.bundle_size {
            debug!(
                from = self.bundle_size,
                to = next,
                mean = tracker.mean(),
                previous_mean = tracker.previous_mean(),
                "adaptive bundle size changed"
            );
        }
        self.bundle_size = next;
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
    use super::*;

    fn bundler(profile: Profile) -> AdaptiveBundler {
        AdaptiveBundler::from_profile(&profile).unwrap()
    }

    #[test]
    fn identical_feedback_converges() {
        let mut b = bundler(Profile::new().with("maxSize", 500));
        let stats = StatisticsRegistry::new();
        let mut tracker = b.new_tracker();

        let mut sizes = Vec::new();
        for _ in 0..50 {
            let size = b.size(&tracker, &stats);
            b.feedback(&mut tracker, size, Duration::from_millis(5 * size as u64));
            sizes.push(b.size(&tracker, &stats));
        }
        let last = *sizes.last().unwrap();
        assert!(sizes[10..].iter().all(|s| *s == last), "sizes: {sizes:?}");
    }

    #[test]
    fn grows_when_tasks_get_faster() {
        let b = bundler(Profile::new());
        assert!(b.next_size(10, 5.0, 10.0) > 10);
    }

    #[test]
    fn shrinks_when_tasks_get_slower() {
        let b = bundler(Profile::new());
        assert!(b.next_size(10, 20.0, 10.0) < 10);
    }

    #[test]
    fn noise_band_keeps_size() {
        let b = bundler(Profile::new().with("tolerance", 0.05));
        assert_eq!(b.next_size(10, 10.3, 10.0), 10);
    }

    #[test]
    fn steps_are_bounded() {
        let b = bundler(
            Profile::new()
                .with("maxStep", 3)
                .with("minSize", 2)
                .with("maxSize", 12),
        );
        assert_eq!(b.next_size(10, 1.0, 100.0), 12);
        assert_eq!(b.next_size(6, 100.0, 1.0), 3);
        assert_eq!(b.next_size(3, 100.0, 1.0), 2);
    }

    #[test]
    fn is_deterministic() {
        let b = bundler(Profile::new());
        assert_eq!(b.next_size(40, 7.0, 9.0), b.next_size(40, 7.0, 9.0));
    }

    #[test]
    fn copies_are_independent() {
        let mut template = bundler(Profile::new());
        let mut copy = template.copy();
        let stats = StatisticsRegistry::new();
        let mut tracker = copy.new_tracker();
        copy.feedback(&mut tracker, 1, Duration::from_millis(1));

        assert!(copy.size(&tracker, &stats) > 1);
        assert_eq!(template.current_size(), 1);

        let mut other = template.new_tracker();
        template.feedback(&mut other, 1, Duration::from_millis(5000));
        assert_eq!(template.current_size(), 1);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(AdaptiveBundler::from_profile(&Profile::new().with("minSize", 0)).is_err());
        assert!(
            AdaptiveBundler::from_profile(&Profile::new().with("minSize", 5).with("maxSize", 2))
                .is_err()
        );
        assert!(AdaptiveBundler::from_profile(&Profile::new().with("gain", -1)).is_err());
    }
}
