use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use grid_model::{ChannelId, JobId, JobOutcome, Task, TaskOutcome};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

static DISPATCH_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifier of one slice handed to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchId(u64);

impl DispatchId {
    pub(crate) fn next() -> Self {
        Self(DISPATCH_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d-{}", self.0)
    }
}

/// A slice of one job's tasks, taken for one channel.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub id: DispatchId,
    pub job: JobId,
    pub channel: ChannelId,
    /// Task positions within the job, ascending.
    pub indices: Vec<usize>,
    /// Tasks at those positions.
    pub tasks: Vec<Task>,
    /// Deadline of the slice, if the job has one.
    pub timeout: Option<Duration>,
    /// Fired when the slice is pulled back by cancel or requeueing suspend.
    pub abort: CancellationToken,
}

impl Dispatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// How a dispatched slice came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceOutcome {
    /// One outcome per task of the slice, in slice order.
    Completed(Vec<TaskOutcome>),
    /// The slice deadline fired.
    Expired,
    /// Not executed; tasks go back to the pool.
    Returned,
}

/// Client side of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, rx: oneshot::Receiver<JobOutcome>) -> Self {
        Self { id, rx }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Resolves once the job completes or is cancelled.
    ///
    /// A scheduler torn down before the job ended reports `Cancelled`.
    pub async fn wait(self) -> JobOutcome {
        self.rx.await.unwrap_or(JobOutcome::Cancelled)
    }
}
