use serde::{Deserialize, Serialize};

use crate::{ChannelId, JobId, JobState, Priority};

/// Read-only view of a queued job for management tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub total_tasks: usize,
    /// Tasks without a result yet (pending or in flight).
    pub remaining_tasks: usize,
    pub priority: Priority,
    pub suspended: bool,
    pub max_nodes: usize,
    /// Slices currently on nodes.
    pub in_flight: usize,
}

/// Per-node dispatch accounting for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDispatchInfo {
    pub channel: ChannelId,
    /// Slices of the job currently running on that node.
    pub dispatches: usize,
    /// Tasks carried by those slices.
    pub tasks: usize,
}
