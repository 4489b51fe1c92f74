use std::time::Duration;

use grid_model::{ChannelId, JobId};
use thiserror::Error;

/// Errors returned synchronously to clients and management tooling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("job already queued: {0}")]
    DuplicateJob(JobId),

    #[error("job has no task: {0}")]
    EmptyJob(JobId),

    #[error("job depends on itself: {0}")]
    SelfDependency(JobId),

    #[error("job closes a dependency cycle: {0}")]
    DependencyCycle(JobId),

    #[error("unknown load-balancing algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("invalid profile parameter: {key}={value}")]
    InvalidProfile { key: String, value: String },

    #[error("job store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

/// Dispatch-level failures.
///
/// These never reach the client directly: the coordinator recovers from them
/// by returning tasks to their job, and only a task's result slot may end up
/// holding a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatch deadline exceeded after {0:?}")]
    Timeout(Duration),

    #[error("channel lost: {0}")]
    ChannelLost(ChannelId),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("dispatch aborted")]
    Aborted,
}
