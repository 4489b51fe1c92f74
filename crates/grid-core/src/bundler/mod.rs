//! Dispatch-size strategies.
//!
//! A [`Bundler`] answers one question per dispatch: how many tasks should the
//! next slice for this channel carry. The driver keeps one template bundler
//! (see [`BundlerFactory`]); every channel works on its own [`Bundler::copy`].
//!
//! ## Algorithms
//! | name                      | type                   | decision input                              |
//! |---------------------------|------------------------|---------------------------------------------|
//! | `manual`                  | [`FixedSizeBundler`]   | configured size                             |
//! | `adaptive` / `autotuned`  | [`AdaptiveBundler`]    | current and previous channel mean           |
//! | `proportional`            | [`ProportionalBundler`]| channel mean vs cluster mean, queue depth   |

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::{perf::PerformanceTracker, stats::StatisticsRegistry};

mod profile;
pub use profile::Profile;

mod fixed;
pub use fixed::FixedSizeBundler;

mod adaptive;
pub use adaptive::AdaptiveBundler;

mod proportional;
pub use proportional::ProportionalBundler;

mod registry;
pub use registry::{BundlerProvider, BundlerRegistry};

mod factory;
pub use factory::BundlerFactory;

static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Next value of the process-wide, strictly increasing bundler generation.
pub(crate) fn next_generation() -> u64 {
    GENERATION.fetch_add(1, Ordering::Relaxed) + 1
}

/// Provenance of a bundler instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stamp {
    /// Generation of the template this bundler was copied from.
    pub created_at: u64,
    /// Built from a node-supplied profile; never replaced by driver reconfiguration.
    pub overridden: bool,
}

/// Strategy computing the size of the next slice sent to a channel.
pub trait Bundler: Send + Sync + fmt::Debug {
    /// Registry name of the algorithm.
    fn algorithm(&self) -> &'static str;

    /// Number of tasks to put in the next slice. Always at least 1.
    fn size(&self, tracker: &PerformanceTracker, stats: &StatisticsRegistry) -> usize;

    /// Called once per completed dispatch; the only write path into the tracker.
    fn feedback(&mut self, tracker: &mut PerformanceTracker, size: usize, total_time: Duration) {
        tracker.record(size, total_time);
    }

    /// Fresh tracker sized for this algorithm's profile.
    fn new_tracker(&self) -> PerformanceTracker;

    /// Independent instance; mutating it never affects `self`.
    fn copy(&self) -> Box<dyn Bundler>;

    fn stamp(&self) -> Stamp;

    fn set_stamp(&mut self, stamp: Stamp);

    #[inline]
    fn created_at(&self) -> u64 {
        self.stamp().created_at
    }

    #[inline]
    fn is_overridden(&self) -> bool {
        self.stamp().overridden
    }
}
