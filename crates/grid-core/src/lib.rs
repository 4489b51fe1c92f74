//! Adaptive scheduling core of the grid driver.
//!
//! Jobs enter a priority [`JobQueue`]; one worker per attached node channel
//! asks its [`Bundler`](bundler::Bundler) how many tasks to take, carves that
//! slice out of the best eligible job and hands it to the [`Transport`].
//! Round-trip feedback flows back into the channel's
//! [`PerformanceTracker`](perf::PerformanceTracker) and the process-wide
//! [`StatisticsRegistry`]. [`JobLifecycleManager`] exposes cancel, suspend,
//! resume and SLA updates to management tooling.

pub mod bundler;
pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod perf;
pub mod stats;
pub mod store;
pub mod transport;

mod context;
pub use context::{SchedulerBuilder, SchedulerContext};

mod coordinator;
pub use coordinator::DispatchCoordinator;

mod lifecycle;
pub use lifecycle::JobLifecycleManager;

pub mod queue;
pub use queue::{Dispatch, DispatchId, JobHandle, JobQueue, SliceOutcome};

pub use bundler::{BundlerFactory, BundlerRegistry, Profile};
pub use channel::{ChannelInfo, ChannelRegistry};
pub use config::{LoadBalancingConfig, SchedulerConfig};
pub use error::{CoreError, DispatchError};
pub use events::{EventBus, JobEvent, JobEventKind};
pub use stats::{StatisticsRegistry, StatisticsSnapshot};
pub use store::{JobStore, MemoryJobStore};
pub use transport::{SliceReply, Transport};
