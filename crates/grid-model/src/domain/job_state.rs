use serde::{Deserialize, Serialize};

/// Lifecycle state of a job inside the driver.
///
/// ```text
/// Queued ⇄ Suspended
///   │
///   ▼
/// Dispatching ──► Completed
///
/// Cancelled is reachable from every non-terminal state.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    /// Waiting for its first dispatch.
    Queued,
    /// Suspended by management tooling; no new dispatches.
    Suspended,
    /// At least one slice was handed to a node.
    Dispatching,
    /// Every task has a result.
    Completed,
    /// Cancelled before completion.
    Cancelled,
}

impl JobState {
    /// Returns `true` if the job will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());

        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Suspended.is_terminal());
        assert!(!JobState::Dispatching.is_terminal());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&JobState::Dispatching).unwrap();
        assert_eq!(json, r#""dispatching""#);
    }
}
