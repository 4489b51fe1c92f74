//! Per-channel performance feedback.
//!
//! A [`PerformanceTracker`] belongs to exactly one channel and is only written
//! by that channel's own completion path, so it carries no locking of its own.

mod sample;
pub use sample::BundlePerformanceSample;

mod window;
pub use window::PerformanceWindow;

mod tracker;
pub use tracker::PerformanceTracker;

/// Mean time per task assumed before any feedback arrives, in milliseconds.
pub const DEFAULT_INITIAL_MEAN_MS: f64 = 1000.0;

/// Default number of task samples a window retains.
pub const DEFAULT_WINDOW_CAPACITY: u64 = 2000;
