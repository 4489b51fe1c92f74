mod ids;
pub use ids::{ChannelId, ClientId, JobId};

mod task;
pub use task::Task;

mod job_sla;
pub use job_sla::{JobSla, UNBOUNDED_NODES, normalize_max_nodes};

mod job_spec;
pub use job_spec::JobSpec;

mod job_state;
pub use job_state::JobState;

mod job_info;
pub use job_info::{JobInfo, NodeDispatchInfo};

mod outcome;
pub use outcome::{JobOutcome, TaskOutcome};

mod selector;
pub use selector::JobSelector;

mod policy;
pub use policy::{ExecutionPolicy, NodeAttributes};

/// Scheduling priority of a job. Higher values dispatch first.
pub type Priority = i32;

/// Timeout value in milliseconds.
///
/// Used by SLAs and scheduler settings where an explicit time limit is required.
pub type TimeoutMs = u64;
