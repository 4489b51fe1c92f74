//! Management operations over sets of jobs.
//!
//! Every operation takes a [`JobSelector`], evaluates it once against the
//! jobs queued at call time, and returns the ids it changed. A selector
//! matching nothing is a successful no-op.

use std::sync::Arc;

use grid_model::{ClientId, JobId, JobInfo, JobSelector, NodeDispatchInfo, Priority};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    events::JobEvent,
    queue::JobQueue,
    stats::{StatisticsRegistry, StatisticsSnapshot},
};

#[derive(Debug, Clone)]
pub struct JobLifecycleManager {
    queue: Arc<JobQueue>,
}

impl JobLifecycleManager {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }

    fn apply(&self, selector: &JobSelector, op: impl Fn(JobId) -> bool) -> Vec<JobId> {
        self.queue
            .select(selector)
            .into_iter()
            .filter(|id| op(*id))
            .collect()
    }

    /// Cancels matching jobs. In-flight slices are aborted, not requeued.
    pub fn cancel(&self, selector: &JobSelector) -> Vec<JobId> {
        let done = self.apply(selector, |id| self.queue.cancel(id, "cancelled"));
        if !done.is_empty() {
            info!(jobs = done.len(), "jobs cancelled");
        }
        done
    }

    /// Stops new dispatches of matching jobs. With `requeue`, slices already
    /// on nodes are pulled back; otherwise they run to completion.
    pub fn suspend(&self, selector: &JobSelector, requeue: bool) -> Vec<JobId> {
        let done = self.apply(selector, |id| self.queue.set_suspended(id, true, requeue));
        debug!(jobs = done.len(), requeue, "jobs suspended");
        done
    }

    /// Clears suspension and wakes idle channels.
    pub fn resume(&self, selector: &JobSelector) -> Vec<JobId> {
        let done = self.apply(selector, |id| self.queue.set_suspended(id, false, false));
        debug!(jobs = done.len(), "jobs resumed");
        done
    }

    /// Zero means unbounded. Lowering the bound never retracts running slices.
    pub fn update_max_nodes(&self, selector: &JobSelector, max_nodes: usize) -> Vec<JobId> {
        self.apply(selector, |id| self.queue.set_max_nodes(id, max_nodes))
    }

    pub fn update_priority(&self, selector: &JobSelector, priority: Priority) -> Vec<JobId> {
        self.apply(selector, |id| self.queue.update_priority(id, priority))
    }

    pub fn client_connected(&self, client: ClientId) {
        self.queue.stats().client_connected();
        debug!(%client, "client connected");
    }

    /// Cancels the client's jobs that follow its lifetime.
    pub fn client_disconnected(&self, client: ClientId) -> Vec<JobId> {
        self.queue.stats().client_disconnected();
        let done: Vec<JobId> = self
            .queue
            .client_jobs(client)
            .into_iter()
            .filter(|id| self.queue.cancel(*id, "client disconnected"))
            .collect();
        info!(%client, cancelled = done.len(), "client disconnected");
        done
    }

    pub fn list_job_ids(&self) -> Vec<JobId> {
        self.queue.job_ids()
    }

    pub fn job_info(&self, id: &JobId) -> Option<JobInfo> {
        self.queue.job_info(id)
    }

    pub fn node_info(&self, id: &JobId) -> Option<Vec<NodeDispatchInfo>> {
        self.queue.node_info(id)
    }

    /// Lifecycle notification feed.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.queue.events().subscribe()
    }

    pub fn statistics(&self) -> &Arc<StatisticsRegistry> {
        self.queue.stats()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        self.queue.stats().snapshot()
    }

    pub fn reset_statistics(&self) {
        self.queue.stats().reset();
        info!("statistics reset");
    }
}
