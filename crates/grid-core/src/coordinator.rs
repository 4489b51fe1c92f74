//! Per-channel dispatch loop.
//!
//! Each attached channel gets one worker task. The worker owns the channel's
//! bundler copy and performance tracker, so feedback for one channel is
//! naturally serialized and needs no lock. Workers of different channels run
//! in parallel and meet only in the [`JobQueue`].
//!
//! ```text
//! loop:
//!   refresh bundler if the driver template changed
//!   size  = bundler.size(tracker, stats)
//!   slice = queue.next_dispatchable(channel, size)
//!     none  -> wait for wake-up | idle poll | detach
//!     some  -> transport.send  (raced against deadline, abort, detach)
//!              ok        -> feedback + statistics, complete slice
//!              timeout   -> abort on node, expire slice
//!              aborted   -> abort on node (tasks already back in the pool)
//!              lost/fault-> return slice, leave loop
//! on exit: return anything still in flight, node disconnected
//! ```
//!
//! Workers are plain `tokio::spawn` tasks tracked by their `JoinHandle` and a
//! child [`CancellationToken`], with no restart policy. A worker whose
//! channel fails is not restarted: the node has to attach again, and its
//! slice is already back in the pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use grid_model::{ChannelId, NodeAttributes};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    bundler::{Bundler, BundlerFactory},
    channel::{ChannelInfo, ChannelRegistry},
    config::LoadBalancingConfig,
    error::DispatchError,
    perf::PerformanceTracker,
    queue::{Dispatch, JobQueue, SliceOutcome},
    transport::Transport,
};

/// Starts and stops channel workers.
pub struct DispatchCoordinator {
    queue: Arc<JobQueue>,
    bundlers: Arc<BundlerFactory>,
    transport: Arc<dyn Transport>,
    channels: Arc<ChannelRegistry>,
    idle_poll: Duration,
    token: CancellationToken,
}

impl std::fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("channels", &self.channels.len())
            .field("idle_poll", &self.idle_poll)
            .finish()
    }
}

impl DispatchCoordinator {
    pub fn new(
        queue: Arc<JobQueue>,
        bundlers: Arc<BundlerFactory>,
        transport: Arc<dyn Transport>,
        idle_poll: Duration,
    ) -> Self {
        Self {
            queue,
            bundlers,
            transport,
            channels: Arc::new(ChannelRegistry::new()),
            idle_poll,
            token: CancellationToken::new(),
        }
    }

    #[inline]
    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// Starts dispatching to `channel`. With `node_config`, the channel's
    /// bundler is built from it and survives driver reconfiguration.
    /// `attributes` are matched against job execution policies.
    ///
    /// Returns `false` if the channel is already attached or the coordinator
    /// is shut down. Must run inside a Tokio runtime.
    pub fn attach(
        &self,
        channel: ChannelId,
        node_config: Option<&LoadBalancingConfig>,
        attributes: NodeAttributes,
    ) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        let bundler = match node_config {
            Some(cfg) => self.bundlers.build_override(cfg),
            None => self.bundlers.new_bundler(),
        };
        let tracker = bundler.new_tracker();
        let token = self.token.child_token();
        let info = ChannelInfo::new(
            channel,
            bundler.algorithm(),
            bundler.is_overridden(),
            tracker.mean(),
        );
        if !self.channels.insert(info, token.clone()) {
            return false;
        }
        self.queue.set_node_attributes(channel, attributes);
        self.queue.stats().node_connected();
        info!(
            %channel,
            algorithm = bundler.algorithm(),
            overridden = bundler.is_overridden(),
            "channel attached"
        );

        let worker = ChannelWorker {
            channel,
            bundler,
            tracker,
            queue: Arc::clone(&self.queue),
            bundlers: Arc::clone(&self.bundlers),
            transport: Arc::clone(&self.transport),
            channels: Arc::clone(&self.channels),
            idle_poll: self.idle_poll,
            token,
        };
        let handle = tokio::spawn(worker.run());
        self.channels.set_handle(channel, handle);
        true
    }

    /// Stops the channel's worker and returns its in-flight slice to the pool.
    pub async fn detach(&self, channel: ChannelId) -> bool {
        let Some(slot) = self.channels.remove(channel) else {
            return false;
        };
        slot.token.cancel();
        if let Some(handle) = slot.handle {
            let _ = handle.await;
        }
        true
    }

    /// Stops every worker and waits for them.
    pub async fn shutdown(&self) {
        self.token.cancel();
        for slot in self.channels.drain() {
            if let Some(handle) = slot.handle {
                let _ = handle.await;
            }
        }
        info!("dispatch coordinator stopped");
    }
}

struct ChannelWorker {
    channel: ChannelId,
    bundler: Box<dyn Bundler>,
    tracker: PerformanceTracker,
    queue: Arc<JobQueue>,
    bundlers: Arc<BundlerFactory>,
    transport: Arc<dyn Transport>,
    channels: Arc<ChannelRegistry>,
    idle_poll: Duration,
    token: CancellationToken,
}

impl ChannelWorker {
    async fn run(mut self) {
        let reason = loop {
            if self.token.is_cancelled() {
                break "detached";
            }
            self.refresh_bundler();

            let queue = Arc::clone(&self.queue);
            let notified = queue.wakeup().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let size = self.bundler.size(&self.tracker, queue.stats());
            let Some(dispatch) = queue.next_dispatchable(self.channel, size) else {
                tokio::select! {
                    _ = self.token.cancelled() => break "detached",
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(self.idle_poll) => {}
                }
                continue;
            };

            if let Err(e) = self.execute(dispatch).await {
                break match e {
                    DispatchError::ChannelLost(_) => "channel lost",
                    _ => "transport failure",
                };
            }
        };

        let returned = self.queue.channel_lost(self.channel);
        self.queue.forget_node(self.channel);
        self.queue.stats().node_disconnected();
        self.channels.remove(self.channel);
        info!(channel = %self.channel, reason, returned, "channel detached");
    }

    fn refresh_bundler(&mut self) {
        if !self.bundlers.is_stale(self.bundler.as_ref()) {
            return;
        }
        let fresh = self.bundlers.new_bundler();
        debug!(
            channel = %self.channel,
            from = self.bundler.algorithm(),
            to = fresh.algorithm(),
            generation = fresh.created_at(),
            "channel bundler replaced"
        );
        self.tracker = fresh.new_tracker();
        self.bundler = fresh;
        let (algorithm, mean) = (self.bundler.algorithm(), self.tracker.mean());
        self.channels.update(self.channel, |i| {
            i.algorithm = algorithm;
            i.mean_time_ms = mean;
        });
    }

    /// Runs one slice to its end. `Err` means the channel is unusable.
    #[instrument(level = "trace", skip(self, dispatch), fields(channel = %self.channel, job = %dispatch.job, size = dispatch.len()))]
    async fn execute(&mut self, dispatch: Dispatch) -> Result<(), DispatchError> {
        let n = dispatch.len();
        self.channels.update(self.channel, |i| {
            i.busy = true;
            i.last_size = n;
        });

        let started = Instant::now();
        let deadline = dispatch.timeout;
        let expiry = async move {
            match deadline {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        let result = tokio::select! {
            r = self.transport.send(self.channel, &dispatch) => r,
            _ = expiry => Err(DispatchError::Timeout(deadline.unwrap_or_default())),
            _ = dispatch.abort.cancelled() => Err(DispatchError::Aborted),
            _ = self.token.cancelled() => Err(DispatchError::ChannelLost(self.channel)),
        };
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(reply) => {
                self.bundler.feedback(&mut self.tracker, n, elapsed);
                let exec = reply.execution_time.unwrap_or(elapsed);
                self.queue.stats().task_executed(exec, elapsed, n);
                trace!(elapsed_ms = elapsed.as_millis() as u64, "slice completed");
                self.queue.complete_slice(
                    dispatch.job,
                    dispatch.id,
                    SliceOutcome::Completed(reply.outcomes),
                );
                Ok(())
            }
            Err(DispatchError::Timeout(t)) => {
                warn!(dispatch = %dispatch.id, timeout_ms = t.as_millis() as u64, "slice deadline exceeded");
                self.transport.abort(self.channel, dispatch.id).await;
                self.queue
                    .complete_slice(dispatch.job, dispatch.id, SliceOutcome::Expired);
                Ok(())
            }
            Err(DispatchError::Aborted) => {
                debug!(dispatch = %dispatch.id, "slice pulled back");
                self.transport.abort(self.channel, dispatch.id).await;
                self.queue
                    .complete_slice(dispatch.job, dispatch.id, SliceOutcome::Returned);
                Ok(())
            }
            Err(e) => {
                if matches!(e, DispatchError::Transport(_)) {
                    error!(dispatch = %dispatch.id, error = %e, "transport failure");
                } else {
                    warn!(dispatch = %dispatch.id, error = %e, "channel lost mid-dispatch");
                    self.transport.abort(self.channel, dispatch.id).await;
                }
                self.queue
                    .complete_slice(dispatch.job, dispatch.id, SliceOutcome::Returned);
                Err(e)
            }
        };

        let (mean, done) = (self.tracker.mean(), outcome.is_ok());
        self.channels.update(self.channel, |i| {
            i.busy = false;
            i.mean_time_ms = mean;
            if done {
                i.dispatches += 1;
            }
        });
        outcome
    }
}
