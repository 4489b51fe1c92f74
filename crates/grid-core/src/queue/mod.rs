//! Prioritised job queue with atomic select-and-slice.
//!
//! One mutex guards the priority index together with every job's dispatch
//! state, so picking a job and carving a slice out of it is a single critical
//! section: two channels can never receive overlapping task indices. Order is
//! `(priority desc, enqueue seq asc)`; re-prioritising keeps the enqueue seq.
//!
//! Every change that can make a channel's next pick different (enqueue,
//! resume, priority change, returned tasks, freed max-nodes slot, job end)
//! wakes **all** waiting channels through [`JobQueue::wakeup`].
//!
//! A dependency is satisfied only once that job has completed. Unknown ids
//! keep the dependent waiting for their submission; cancelling a job cancels
//! everything that depends on it, transitively. A job that would close a
//! dependency cycle is rejected at enqueue.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use grid_model::{
    ChannelId, ClientId, JobId, JobInfo, JobSelector, JobSpec, NodeAttributes, NodeDispatchInfo,
    Priority, TaskOutcome, normalize_max_nodes,
};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    error::CoreError,
    events::{EventBus, JobEvent, JobEventKind},
    stats::StatisticsRegistry,
    store::JobStore,
};

mod dispatch;
pub use dispatch::{Dispatch, DispatchId, JobHandle, SliceOutcome};

mod ended;
use ended::{EndedJobs, Ending};

mod job;
use job::QueuedJob;

type OrderKey = (Reverse<Priority>, u64, JobId);

const DEPENDENCY_CANCELLED: &str = "dependency cancelled";

/// Attributes of channels that never advertised any.
static NO_ATTRIBUTES: NodeAttributes = NodeAttributes::new();

#[derive(Debug, Default)]
struct QueueInner {
    jobs: HashMap<JobId, QueuedJob>,
    order: BTreeSet<OrderKey>,
    ended: EndedJobs,
    nodes: HashMap<ChannelId, NodeAttributes>,
    next_seq: u64,
}

impl QueueInner {
    fn key(job: &QueuedJob) -> OrderKey {
        (Reverse(job.spec.sla.priority), job.seq, job.id())
    }

    fn remove(&mut self, id: &JobId) -> Option<QueuedJob> {
        let job = self.jobs.remove(id)?;
        self.order.remove(&Self::key(&job));
        Some(job)
    }

    /// Whether `id`, reached through queued jobs' dependencies from `deps`, depends on itself.
    fn closes_cycle(&self, id: JobId, deps: &BTreeSet<JobId>) -> bool {
        let mut stack: Vec<JobId> = deps.iter().copied().collect();
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if next == id {
                return true;
            }
            if seen.insert(next)
                && let Some(job) = self.jobs.get(&next)
            {
                stack.extend(job.spec.sla.dependencies.iter().copied());
            }
        }
        false
    }

    fn dependents_of(&self, id: &JobId) -> Vec<JobId> {
        self.jobs
            .values()
            .filter(|j| j.spec.sla.dependencies.contains(id))
            .map(|j| j.id())
            .collect()
    }
}

/// All jobs awaiting or undergoing dispatch.
pub struct JobQueue {
    inner: Mutex<QueueInner>,
    wakeup: Notify,
    stats: Arc<StatisticsRegistry>,
    events: EventBus,
    store: Option<Arc<dyn JobStore>>,
    default_timeout: Option<Duration>,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("jobs", &self.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl JobQueue {
    pub fn new(stats: Arc<StatisticsRegistry>, events: EventBus) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            wakeup: Notify::new(),
            stats,
            events,
            store: None,
            default_timeout: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Slice deadline for jobs whose SLA sets none.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcast signal for idle channels.
    #[inline]
    pub fn wakeup(&self) -> &Notify {
        &self.wakeup
    }

    #[inline]
    fn wake_all(&self) {
        self.wakeup.notify_waiters();
    }

    /// Inserts a new job.
    ///
    /// Fails on an empty task list, a self-dependency, a dependency cycle, a
    /// duplicate id, or a store error. The job is dispatchable at once unless
    /// suspended or waiting on a dependency. A job with an already cancelled
    /// dependency is cancelled right away; its handle resolves to
    /// [`JobOutcome::Cancelled`](grid_model::JobOutcome::Cancelled).
    #[instrument(level = "debug", skip(self, spec), fields(job = %spec.id, tasks = spec.task_count()))]
    pub fn enqueue(&self, mut spec: JobSpec) -> Result<JobHandle, CoreError> {
        if spec.tasks.is_empty() {
            return Err(CoreError::EmptyJob(spec.id));
        }
        if spec.sla.dependencies.contains(&spec.id) {
            return Err(CoreError::SelfDependency(spec.id));
        }
        spec.sla.max_nodes = normalize_max_nodes(spec.sla.max_nodes);

        let id = spec.id;
        let tasks = spec.task_count();
        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.lock();
            if inner.jobs.contains_key(&id) {
                return Err(CoreError::DuplicateJob(id));
            }
            if inner.closes_cycle(id, &spec.sla.dependencies) {
                return Err(CoreError::DependencyCycle(id));
            }
            if let Some(store) = &self.store {
                store.store(&spec)?;
            }

            let doomed = spec
                .sla
                .dependencies
                .iter()
                .any(|dep| inner.ended.get(dep) == Some(Ending::Cancelled));
            let seq = inner.next_seq;
            inner.next_seq += 1;
            let job = QueuedJob::new(spec, seq, tx);
            inner.order.insert(QueueInner::key(&job));
            inner.jobs.insert(id, job);

            self.stats.task_queued(tasks);
            self.stats.job_queued();
            self.events
                .publish(JobEvent::new(JobEventKind::Queued, id).with_tasks(tasks));
            if doomed {
                self.cancel_locked(&mut inner, id, DEPENDENCY_CANCELLED);
            }
        }
        debug!("job queued");
        self.wake_all();
        Ok(JobHandle::new(id, rx))
    }

    /// Takes up to `size` tasks of the best eligible job for `channel`.
    ///
    /// Eligible: not suspended, tasks left to dispatch, every dependency
    /// completed, fewer in-flight slices than `max_nodes`, and an execution
    /// policy (if any) matching the channel's node attributes. Returns `None`
    /// when nothing qualifies.
    pub fn next_dispatchable(&self, channel: ChannelId, size: usize) -> Option<Dispatch> {
        let mut inner = self.lock();
        let QueueInner {
            jobs,
            order,
            ended,
            nodes,
            ..
        } = &mut *inner;
        let node = nodes.get(&channel).unwrap_or(&NO_ATTRIBUTES);
        let completed =
            |dep: &JobId| !jobs.contains_key(dep) && ended.get(dep) == Some(Ending::Completed);

        let id = order.iter().map(|(_, _, id)| *id).find(|id| {
            jobs.get(id)
                .is_some_and(|j| j.is_dispatchable(node, completed))
        })?;
        let job = jobs.get_mut(&id)?;

        let (dispatch_id, indices, abort) = job.take(channel, size);
        let tasks = indices
            .iter()
            .filter_map(|i| job.spec.tasks.get(*i).cloned())
            .collect();
        let timeout = job
            .spec
            .sla
            .dispatch_timeout_ms
            .map(Duration::from_millis)
            .or(self.default_timeout);

        self.stats.task_dequeued(job.mean_wait(&indices), indices.len());
        self.events.publish(
            JobEvent::new(JobEventKind::Dispatched, id)
                .with_channel(channel)
                .with_tasks(indices.len()),
        );
        trace!(job = %id, %channel, dispatch = %dispatch_id, size = indices.len(), "slice taken");

        Some(Dispatch {
            id: dispatch_id,
            job: id,
            channel,
            indices,
            tasks,
            timeout,
            abort,
        })
    }

    /// Closes a dispatched slice.
    ///
    /// `Completed` fills the result slots (missing outcomes become failures).
    /// `Expired` counts one expiration per task: tasks past the job's bound are
    /// failed, the rest return to the pool. `Returned` puts every task back.
    /// A slice already pulled back by cancel or suspend is ignored.
    ///
    /// Returns `true` when this call ended the job.
    pub fn complete_slice(&self, job_id: JobId, dispatch: DispatchId, outcome: SliceOutcome) -> bool {
        let ended = {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&job_id) else {
                return false;
            };
            let Some(flight) = job.close(dispatch) else {
                return false;
            };
            let n = flight.indices.len();
            let mut event = JobEvent::new(JobEventKind::Returned, job_id)
                .with_channel(flight.channel)
                .with_tasks(n);

            match outcome {
                SliceOutcome::Completed(outcomes) => {
                    let mut outcomes = outcomes.into_iter();
                    for &i in &flight.indices {
                        let out = outcomes
                            .next()
                            .unwrap_or_else(|| TaskOutcome::Failure("missing task result".into()));
                        job.resolve(i, out);
                    }
                }
                SliceOutcome::Expired => {
                    let max = job.spec.sla.max_dispatch_expirations;
                    let mut requeued = Vec::with_capacity(n);
                    for &i in &flight.indices {
                        let count = job.expire(i);
                        if count > max {
                            job.resolve(
                                i,
                                TaskOutcome::Failure(format!("dispatch expired {count} times")),
                            );
                        } else {
                            requeued.push(i);
                        }
                    }
                    job.give_back(&requeued);
                    self.stats.dispatch_expired(n);
                    if !requeued.is_empty() {
                        self.stats.task_queued(requeued.len());
                    }
                    warn!(job = %job_id, dispatch = %dispatch, tasks = n, requeued = requeued.len(), "dispatch expired");
                    event = event.with_reason("expired");
                }
                SliceOutcome::Returned => {
                    job.give_back(&flight.indices);
                    self.stats.task_queued(n);
                    event = event.with_reason("returned");
                }
            }
            self.events.publish(event);

            if !job.is_complete() {
                false
            } else {
                if let Some(job) = inner.remove(&job_id) {
                    inner.ended.record(job_id, Ending::Completed);
                    self.end(job, false, None);
                }
                true
            }
        };
        self.wake_all();
        ended
    }

    /// Returns every slice in flight on `channel` to its job's pool.
    ///
    /// Returns the number of tasks given back.
    pub fn channel_lost(&self, channel: ChannelId) -> usize {
        let returned = {
            let mut inner = self.lock();
            let mut total = 0;
            for job in inner.jobs.values_mut() {
                let n = job.recall(Some(channel));
                if n > 0 {
                    self.events.publish(
                        JobEvent::new(JobEventKind::Returned, job.id())
                            .with_channel(channel)
                            .with_tasks(n)
                            .with_reason("channel lost"),
                    );
                    total += n;
                }
            }
            if total > 0 {
                self.stats.task_queued(total);
            }
            total
        };
        if returned > 0 {
            warn!(%channel, tasks = returned, "in-flight tasks returned after channel loss");
            self.wake_all();
        }
        returned
    }

    /// Re-orders a job. Visible to the very next [`next_dispatchable`](Self::next_dispatchable).
    pub fn update_priority(&self, id: JobId, priority: Priority) -> bool {
        {
            let mut inner = self.lock();
            let QueueInner { jobs, order, .. } = &mut *inner;
            let Some(job) = jobs.get_mut(&id) else {
                return false;
            };
            if job.spec.sla.priority == priority {
                return false;
            }
            order.remove(&QueueInner::key(job));
            job.spec.sla.priority = priority;
            order.insert(QueueInner::key(job));
            self.events
                .publish(JobEvent::new(JobEventKind::Updated, id).with_reason("priority"));
        }
        debug!(job = %id, priority, "priority updated");
        self.wake_all();
        true
    }

    /// Sets or clears the suspended flag. With `requeue`, suspending also pulls
    /// back the job's in-flight slices. Returns `false` if nothing changed.
    pub fn set_suspended(&self, id: JobId, suspended: bool, requeue: bool) -> bool {
        {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&id) else {
                return false;
            };
            if job.spec.sla.suspended == suspended {
                return false;
            }
            job.spec.sla.suspended = suspended;
            let recalled = if suspended && requeue {
                job.recall(None)
            } else {
                0
            };
            if recalled > 0 {
                self.stats.task_queued(recalled);
            }
            let reason = if suspended { "suspended" } else { "resumed" };
            self.events.publish(
                JobEvent::new(JobEventKind::Updated, id)
                    .with_tasks(recalled)
                    .with_reason(reason),
            );
            debug!(job = %id, suspended, recalled, "suspension changed");
        }
        self.wake_all();
        true
    }

    /// Changes `max_nodes`. Slices already in flight are left alone.
    pub fn set_max_nodes(&self, id: JobId, max_nodes: usize) -> bool {
        let max_nodes = normalize_max_nodes(max_nodes);
        {
            let mut inner = self.lock();
            let Some(job) = inner.jobs.get_mut(&id) else {
                return false;
            };
            if job.spec.sla.max_nodes == max_nodes {
                return false;
            }
            job.spec.sla.max_nodes = max_nodes;
            self.events
                .publish(JobEvent::new(JobEventKind::Updated, id).with_reason("max nodes"));
        }
        self.wake_all();
        true
    }

    /// Removes a job, aborting its in-flight slices without requeueing them.
    /// Jobs depending on it, directly or not, are cancelled with it.
    ///
    /// Returns `false` if the job is not queued (already ended or unknown).
    pub fn cancel(&self, id: JobId, reason: &str) -> bool {
        let cancelled = self.cancel_locked(&mut self.lock(), id, reason);
        if cancelled {
            self.wake_all();
        }
        cancelled
    }

    fn cancel_locked(&self, inner: &mut QueueInner, id: JobId, reason: &str) -> bool {
        let Some(root) = inner.remove(&id) else {
            return false;
        };
        let mut doomed = vec![(root, reason)];
        while let Some((job, why)) = doomed.pop() {
            let gone = job.id();
            inner.ended.record(gone, Ending::Cancelled);
            for dependent in inner.dependents_of(&gone) {
                if let Some(next) = inner.remove(&dependent) {
                    debug!(job = %dependent, dependency = %gone, "cancelling dependent job");
                    doomed.push((next, DEPENDENCY_CANCELLED));
                }
            }
            job.abort_all();
            self.stats.task_withdrawn(job.pending());
            self.end(job, true, Some(why));
        }
        true
    }

    /// Cancels `id` with reason `"expired"` once `after` has elapsed, unless it
    /// ends first. Returns `None` if the job is not queued.
    ///
    /// Must run inside a Tokio runtime.
    pub fn schedule_expiration(self: &Arc<Self>, id: JobId, after: Duration) -> Option<JoinHandle<()>> {
        let done = self.lock().jobs.get(&id)?.done().clone();
        let queue = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = done.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    if let Some(queue) = queue.upgrade()
                        && queue.cancel(id, "expired")
                    {
                        warn!(job = %id, after_ms = after.as_millis() as u64, "job expired");
                    }
                }
            }
        }))
    }

    /// Records what the node behind `channel` advertises, for execution policies.
    pub fn set_node_attributes(&self, channel: ChannelId, attributes: NodeAttributes) {
        self.lock().nodes.insert(channel, attributes);
        self.wake_all();
    }

    pub fn forget_node(&self, channel: ChannelId) {
        self.lock().nodes.remove(&channel);
    }

    fn end(&self, job: QueuedJob, cancelled: bool, reason: Option<&str>) {
        let id = job.id();
        self.stats.job_ended();
        if let Some(store) = &self.store
            && let Err(e) = store.remove(&id)
        {
            warn!(job = %id, error = %e, "failed to remove job from store");
        }
        let mut ev = JobEvent::new(JobEventKind::Ended, id);
        if let Some(r) = reason {
            ev = ev.with_reason(r);
        }
        self.events.publish(ev);
        info!(job = %id, name = %job.spec.name, cancelled, "job ended");
        job.finish(cancelled);
    }

    /// Ids of the jobs matching `selector`, in dispatch order.
    pub fn select(&self, selector: &JobSelector) -> Vec<JobId> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|(_, _, id)| inner.jobs.get(id))
            .filter(|j| selector.matches(&j.spec))
            .map(|j| j.id())
            .collect()
    }

    /// Jobs of `client` that follow its lifetime.
    pub fn client_jobs(&self, client: ClientId) -> Vec<JobId> {
        let inner = self.lock();
        inner
            .jobs
            .values()
            .filter(|j| j.spec.client == Some(client) && j.spec.sla.cancel_upon_client_disconnect)
            .map(|j| j.id())
            .collect()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.select(&JobSelector::All)
    }

    pub fn job_info(&self, id: &JobId) -> Option<JobInfo> {
        self.lock().jobs.get(id).map(|j| j.info())
    }

    pub fn node_info(&self, id: &JobId) -> Option<Vec<NodeDispatchInfo>> {
        self.lock().jobs.get(id).map(|j| j.node_info())
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn stats(&self) -> &Arc<StatisticsRegistry> {
        &self.stats
    }

    #[inline]
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
