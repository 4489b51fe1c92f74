use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use grid_model::{
    ChannelId, JobId, JobInfo, JobOutcome, JobSpec, JobState, NodeAttributes, NodeDispatchInfo,
    TaskOutcome,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::DispatchId;

#[derive(Debug)]
pub(super) struct InFlight {
    pub channel: ChannelId,
    pub indices: Vec<usize>,
    pub abort: CancellationToken,
}

/// Dispatch state of one queued job.
///
/// Every task index is in exactly one of `pending`, one `in_flight` entry, or
/// has its `results` slot filled.
#[derive(Debug)]
pub(super) struct QueuedJob {
    pub spec: JobSpec,
    pub seq: u64,
    pending: BTreeSet<usize>,
    /// When each task last entered `pending`.
    ready_at: Vec<Instant>,
    in_flight: HashMap<DispatchId, InFlight>,
    results: Vec<Option<TaskOutcome>>,
    completed: usize,
    expirations: Vec<u32>,
    dispatched_once: bool,
    notify: Option<oneshot::Sender<JobOutcome>>,
    done: CancellationToken,
}

impl QueuedJob {
    pub fn new(spec: JobSpec, seq: u64, notify: oneshot::Sender<JobOutcome>) -> Self {
        let n = spec.task_count();
        Self {
            spec,
            seq,
            pending: (0..n).collect(),
            ready_at: vec![Instant::now(); n],
            in_flight: HashMap::new(),
            results: vec![None; n],
            completed: 0,
            expirations: vec![0; n],
            dispatched_once: false,
            notify: Some(notify),
            done: CancellationToken::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.spec.id
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Fires once the job has ended, however it ended.
    #[inline]
    pub fn done(&self) -> &CancellationToken {
        &self.done
    }

    /// Eligible for a new slice on `node`. `completed` tells whether a
    /// dependency has finished successfully.
    pub fn is_dispatchable(&self, node: &NodeAttributes, completed: impl Fn(&JobId) -> bool) -> bool {
        let sla = &self.spec.sla;
        !sla.suspended
            && !self.pending.is_empty()
            && self.in_flight.len() < sla.max_nodes
            && sla.dependencies.iter().all(completed)
            && sla.policy.as_ref().is_none_or(|p| p.matches(node))
    }

    /// Moves up to `size` lowest pending indices into a new in-flight entry.
    pub fn take(
        &mut self,
        channel: ChannelId,
        size: usize,
    ) -> (DispatchId, Vec<usize>, CancellationToken) {
        let indices: Vec<usize> = self.pending.iter().take(size.max(1)).copied().collect();
        for i in &indices {
            self.pending.remove(i);
        }
        let id = DispatchId::next();
        let abort = CancellationToken::new();
        self.in_flight.insert(
            id,
            InFlight {
                channel,
                indices: indices.clone(),
                abort: abort.clone(),
            },
        );
        self.dispatched_once = true;
        (id, indices, abort)
    }

    /// Mean time `indices` spent in the pool since they last entered it.
    pub fn mean_wait(&self, indices: &[usize]) -> Duration {
        if indices.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = indices
            .iter()
            .filter_map(|i| self.ready_at.get(*i))
            .map(Instant::elapsed)
            .sum();
        total / indices.len() as u32
    }

    pub fn close(&mut self, dispatch: DispatchId) -> Option<InFlight> {
        self.in_flight.remove(&dispatch)
    }

    pub fn resolve(&mut self, index: usize, outcome: TaskOutcome) {
        if let Some(slot) = self.results.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(outcome);
            self.completed += 1;
        }
    }

    /// Puts tasks back into the pending pool.
    pub fn give_back(&mut self, indices: &[usize]) {
        let now = Instant::now();
        for &i in indices {
            if let Some(at) = self.ready_at.get_mut(i) {
                *at = now;
            }
            self.pending.insert(i);
        }
    }

    /// Counts one expiration for `index` and returns the new count.
    pub fn expire(&mut self, index: usize) -> u32 {
        match self.expirations.get_mut(index) {
            Some(n) => {
                *n += 1;
                *n
            }
            None => 0,
        }
    }

    /// Pulls back every in-flight slice (optionally only those on `channel`),
    /// firing their abort tokens. Returns the number of tasks returned.
    pub fn recall(&mut self, channel: Option<ChannelId>) -> usize {
        let ids: Vec<DispatchId> = self
            .in_flight
            .iter()
            .filter(|(_, f)| channel.is_none_or(|c| f.channel == c))
            .map(|(id, _)| *id)
            .collect();

        let mut returned = 0;
        for id in ids {
            if let Some(f) = self.in_flight.remove(&id) {
                f.abort.cancel();
                returned += f.indices.len();
                self.give_back(&f.indices);
            }
        }
        returned
    }

    /// Fires every abort token without touching task state.
    pub fn abort_all(&self) {
        for f in self.in_flight.values() {
            f.abort.cancel();
        }
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.completed == self.results.len()
    }

    pub fn state(&self) -> JobState {
        if self.is_complete() {
            JobState::Completed
        } else if self.spec.sla.suspended {
            JobState::Suspended
        } else if self.dispatched_once {
            JobState::Dispatching
        } else {
            JobState::Queued
        }
    }

    pub fn info(&self) -> JobInfo {
        let sla = &self.spec.sla;
        JobInfo {
            id: self.spec.id,
            name: self.spec.name.clone(),
            state: self.state(),
            total_tasks: self.results.len(),
            remaining_tasks: self.results.len() - self.completed,
            priority: sla.priority,
            suspended: sla.suspended,
            max_nodes: sla.max_nodes,
            in_flight: self.in_flight.len(),
        }
    }

    pub fn node_info(&self) -> Vec<NodeDispatchInfo> {
        let mut per_node: BTreeMap<ChannelId, NodeDispatchInfo> = BTreeMap::new();
        for f in self.in_flight.values() {
            let e = per_node.entry(f.channel).or_insert(NodeDispatchInfo {
                channel: f.channel,
                dispatches: 0,
                tasks: 0,
            });
            e.dispatches += 1;
            e.tasks += f.indices.len();
        }
        per_node.into_values().collect()
    }

    /// Sends the final outcome to the client, if still listening.
    pub fn finish(mut self, cancelled: bool) {
        let outcome = if cancelled {
            JobOutcome::Cancelled
        } else {
            JobOutcome::Completed(
                self.results
                    .drain(..)
                    .map(|r| r.unwrap_or_else(|| TaskOutcome::Failure("no result".into())))
                    .collect(),
            )
        };
        if let Some(tx) = self.notify.take() {
            let _ = tx.send(outcome);
        }
        self.done.cancel();
    }
}
