use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ExecutionPolicy, JobId, Priority, TimeoutMs};

/// Sentinel for "no limit on concurrent node dispatches".
pub const UNBOUNDED_NODES: usize = usize::MAX;

/// Per-job scheduling constraints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSla {
    /// Higher priority jobs are considered first.
    pub priority: Priority,
    /// Maximum number of slices of this job in flight at once.
    pub max_nodes: usize,
    /// A suspended job keeps its queue position but gets no new dispatches.
    pub suspended: bool,
    /// Cancel the job when the submitting client goes away.
    pub cancel_upon_client_disconnect: bool,
    /// Jobs that must complete before this one becomes dispatchable.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<JobId>,
    /// Deadline of a single dispatched slice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_timeout_ms: Option<TimeoutMs>,
    /// How many times one task may expire before it is failed for good.
    pub max_dispatch_expirations: u32,
    /// The whole job is cancelled this long after it was queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_expiration_ms: Option<TimeoutMs>,
    /// Nodes the job may run on; `None` accepts every node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<ExecutionPolicy>,
}

impl Default for JobSla {
    fn default() -> Self {
        Self {
            priority: 0,
            max_nodes: UNBOUNDED_NODES,
            suspended: false,
            cancel_upon_client_disconnect: true,
            dependencies: BTreeSet::new(),
            dispatch_timeout_ms: None,
            max_dispatch_expirations: 0,
            job_expiration_ms: None,
            policy: None,
        }
    }
}

impl JobSla {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Zero means unbounded.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = normalize_max_nodes(max_nodes);
        self
    }

    pub fn with_suspended(mut self, suspended: bool) -> Self {
        self.suspended = suspended;
        self
    }

    pub fn with_cancel_upon_client_disconnect(mut self, cancel: bool) -> Self {
        self.cancel_upon_client_disconnect = cancel;
        self
    }

    pub fn with_dependency(mut self, job: JobId) -> Self {
        self.dependencies.insert(job);
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout_ms: TimeoutMs, max_expirations: u32) -> Self {
        self.dispatch_timeout_ms = Some(timeout_ms);
        self.max_dispatch_expirations = max_expirations;
        self
    }

    pub fn with_job_expiration(mut self, expiration_ms: TimeoutMs) -> Self {
        self.job_expiration_ms = Some(expiration_ms);
        self
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.max_nodes == UNBOUNDED_NODES
    }
}

/// Zero means unbounded.
#[inline]
pub fn normalize_max_nodes(max_nodes: usize) -> usize {
    if max_nodes == 0 {
        UNBOUNDED_NODES
    } else {
        max_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_defaults() {
        let sla = JobSla::default();
        assert_eq!(sla.priority, 0);
        assert!(sla.is_unbounded());
        assert!(!sla.suspended);
        assert!(sla.cancel_upon_client_disconnect);
        assert_eq!(sla.max_dispatch_expirations, 0);
    }

    #[test]
    fn zero_max_nodes_means_unbounded() {
        assert!(JobSla::default().with_max_nodes(0).is_unbounded());
        assert_eq!(JobSla::default().with_max_nodes(3).max_nodes, 3);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let sla: JobSla = serde_json::from_str(r#"{"priority":7}"#).unwrap();
        assert_eq!(sla.priority, 7);
        assert!(sla.is_unbounded());
        assert!(sla.cancel_upon_client_disconnect);
    }

    #[test]
    fn policy_and_expiration_round_out_the_contract() {
        let sla: JobSla = serde_json::from_str(
            r#"{"jobExpirationMs":500,"policy":{"rule":"exists","key":"gpu"}}"#,
        )
        .unwrap();
        assert_eq!(sla.job_expiration_ms, Some(500));
        assert_eq!(sla.policy, Some(ExecutionPolicy::exists("gpu")));
        assert!(JobSla::default().policy.is_none());
    }
}
