use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use grid_model::{ChannelId, JobId};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEventKind {
    /// Accepted into the queue.
    Queued,
    /// A slice left for a node. Sets `channel` and `tasks`.
    Dispatched,
    /// A slice came back from a node, completed or returned to the pool.
    /// Sets `channel`, `tasks` and, for a non-completed slice, `reason`.
    Returned,
    /// Left the queue: completed or cancelled. Sets `reason` when cancelled.
    Ended,
    /// SLA changed: priority, max nodes, suspension.
    Updated,
}

impl JobEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobEventKind::Queued => "queued",
            JobEventKind::Dispatched => "dispatched",
            JobEventKind::Returned => "returned",
            JobEventKind::Ended => "ended",
            JobEventKind::Updated => "updated",
        }
    }
}

impl fmt::Display for JobEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle notification.
///
/// `seq` is process-wide and strictly increasing; use it to restore order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: JobEventKind,
    pub job: JobId,
    pub channel: Option<ChannelId>,
    pub tasks: usize,
    pub reason: Option<String>,
}

impl JobEvent {
    pub fn new(kind: JobEventKind, job: JobId) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            job,
            channel: None,
            tasks: 0,
            reason: None,
        }
    }

    pub fn with_channel(mut self, channel: ChannelId) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_tasks(mut self, tasks: usize) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
