use serde::{Deserialize, Serialize};

/// Result slot of a single task: either a value or a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskOutcome {
    /// Value produced by the node.
    Value(Vec<u8>),
    /// The task raised an error on the node, or was failed by the scheduler.
    Failure(String),
}

impl TaskOutcome {
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failure(_))
    }
}

/// Client-facing result of a whole job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobOutcome {
    /// One outcome per task, in submission order.
    Completed(Vec<TaskOutcome>),
    Cancelled,
}

impl JobOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }

    /// Task outcomes, empty for a cancelled job.
    pub fn outcomes(&self) -> &[TaskOutcome] {
        match self {
            JobOutcome::Completed(outcomes) => outcomes,
            JobOutcome::Cancelled => &[],
        }
    }
}
