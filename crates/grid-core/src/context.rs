//! Driver-wide wiring.
//!
//! [`SchedulerContext`] is built once at startup and owns every shared
//! component; nothing in the crate reaches for global driver state.

use std::sync::Arc;
use std::time::Duration;

use grid_model::{ChannelId, JobId, JobSpec, NodeAttributes};
use tracing::{info, warn};

use crate::{
    bundler::{BundlerFactory, BundlerRegistry},
    channel::ChannelRegistry,
    config::{LoadBalancingConfig, SchedulerConfig},
    coordinator::DispatchCoordinator,
    error::CoreError,
    events::EventBus,
    lifecycle::JobLifecycleManager,
    queue::{JobHandle, JobQueue},
    stats::StatisticsRegistry,
    store::JobStore,
    transport::Transport,
};

/// Assembles a [`SchedulerContext`].
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn JobStore>>,
    registry: BundlerRegistry,
}

impl SchedulerBuilder {
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the set of known load-balancing algorithms.
    pub fn with_registry(mut self, registry: BundlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Validates the configuration and builds the driver.
    ///
    /// An unknown or invalid driver algorithm is not fatal: the context starts
    /// with a single-task `manual` bundler and logs a warning.
    pub fn build(self) -> Result<SchedulerContext, CoreError> {
        self.config.validate()?;

        let stats = Arc::new(StatisticsRegistry::new());
        let events = EventBus::new(self.config.event_capacity);

        let mut queue = JobQueue::new(Arc::clone(&stats), events.clone()).with_default_timeout(
            self.config
                .default_dispatch_timeout_ms
                .map(Duration::from_millis),
        );
        if let Some(store) = self.store.clone() {
            queue = queue.with_store(store);
        }
        let queue = Arc::new(queue);

        let bundlers = match BundlerFactory::new(self.registry.clone(), &self.config.load_balancing) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    algorithm = %self.config.load_balancing.algorithm,
                    error = %e,
                    "load-balancing configuration rejected, falling back to manual size 1"
                );
                BundlerFactory::new(self.registry, &LoadBalancingConfig::new("manual"))
                    .or_else(|_| {
                        BundlerFactory::new(
                            BundlerRegistry::with_defaults(),
                            &LoadBalancingConfig::new("manual"),
                        )
                    })?
            }
        };
        let bundlers = Arc::new(bundlers);

        let coordinator = DispatchCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&bundlers),
            self.transport,
            self.config.idle_poll(),
        );
        let lifecycle = JobLifecycleManager::new(Arc::clone(&queue));

        info!(
            algorithm = %bundlers.current_config().algorithm,
            persistent = self.store.is_some(),
            "scheduler ready"
        );
        Ok(SchedulerContext {
            config: self.config,
            stats,
            queue,
            bundlers,
            coordinator,
            lifecycle,
            store: self.store,
        })
    }
}

/// The driver: queue, bundlers, channel workers, lifecycle control.
pub struct SchedulerContext {
    config: SchedulerConfig,
    stats: Arc<StatisticsRegistry>,
    queue: Arc<JobQueue>,
    bundlers: Arc<BundlerFactory>,
    coordinator: DispatchCoordinator,
    lifecycle: JobLifecycleManager,
    store: Option<Arc<dyn JobStore>>,
}

impl std::fmt::Debug for SchedulerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerContext")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("coordinator", &self.coordinator)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl SchedulerContext {
    pub fn builder(transport: Arc<dyn Transport>) -> SchedulerBuilder {
        SchedulerBuilder {
            config: SchedulerConfig::default(),
            transport,
            store: None,
            registry: BundlerRegistry::with_defaults(),
        }
    }

    /// Queues a job; the handle resolves when it completes or is cancelled.
    ///
    /// A job with `job_expiration_ms` is cancelled with reason `"expired"`
    /// if it has not ended by then.
    pub fn submit(&self, job: JobSpec) -> Result<JobHandle, CoreError> {
        let expiration = job.sla.job_expiration_ms.map(Duration::from_millis);
        let handle = self.queue.enqueue(job)?;
        if let Some(after) = expiration {
            self.queue.schedule_expiration(handle.id(), after);
        }
        Ok(handle)
    }

    /// Re-queues a job kept by the store, e.g. after a driver restart.
    pub fn resubmit_stored(&self, id: &JobId) -> Result<Option<JobHandle>, CoreError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match store.load(id)? {
            Some(spec) => self.submit(spec).map(Some),
            None => Ok(None),
        }
    }

    /// Starts dispatching to a node. `node_config` overrides the driver's
    /// load-balancing settings for that node only.
    pub fn attach_node(&self, channel: ChannelId, node_config: Option<&LoadBalancingConfig>) -> bool {
        self.coordinator.attach(channel, node_config, NodeAttributes::new())
    }

    /// Like [`attach_node`](Self::attach_node), for a node advertising
    /// attributes that job execution policies can select on.
    pub fn attach_node_with_attributes(
        &self,
        channel: ChannelId,
        node_config: Option<&LoadBalancingConfig>,
        attributes: NodeAttributes,
    ) -> bool {
        self.coordinator.attach(channel, node_config, attributes)
    }

    pub async fn detach_node(&self, channel: ChannelId) -> bool {
        self.coordinator.detach(channel).await
    }

    /// Swaps the driver bundler template; channels pick it up before their next dispatch.
    pub fn update_load_balancing(&self, config: LoadBalancingConfig) -> Result<u64, CoreError> {
        let generation = self.bundlers.update_configuration(config)?;
        self.queue.wakeup().notify_waiters();
        Ok(generation)
    }

    #[inline]
    pub fn lifecycle(&self) -> &JobLifecycleManager {
        &self.lifecycle
    }

    #[inline]
    pub fn statistics(&self) -> &Arc<StatisticsRegistry> {
        &self.stats
    }

    #[inline]
    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    #[inline]
    pub fn bundlers(&self) -> &Arc<BundlerFactory> {
        &self.bundlers
    }

    #[inline]
    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        self.coordinator.channels()
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Stops all channel workers. Queued jobs stay queued.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use grid_model::{Task, TaskOutcome};

    use super::*;
    use crate::{
        error::DispatchError,
        queue::Dispatch,
        store::MemoryJobStore,
        transport::SliceReply,
    };

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, _: ChannelId, d: &Dispatch) -> Result<SliceReply, DispatchError> {
            Ok(SliceReply::new(
                d.tasks.iter().map(|t| TaskOutcome::Value(t.payload.clone())).collect(),
            ))
        }
    }

    #[test]
    fn unknown_algorithm_falls_back_to_manual() {
        let cfg = SchedulerConfig::default().with_load_balancing(LoadBalancingConfig::new("nope"));
        let ctx = SchedulerContext::builder(Arc::new(Echo))
            .with_config(cfg)
            .build()
            .unwrap();
        assert_eq!(ctx.bundlers().current_config().algorithm, "manual");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = SchedulerConfig::default();
        cfg.idle_poll_ms = 0;
        assert!(matches!(
            SchedulerContext::builder(Arc::new(Echo)).with_config(cfg).build(),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn submit_runs_to_completion() {
        let ctx = SchedulerContext::builder(Arc::new(Echo)).build().unwrap();
        assert!(ctx.attach_node(ChannelId::new(), None));

        let tasks = (0..20u8).map(|i| Task::new(vec![i])).collect();
        let handle = ctx.submit(JobSpec::new("echo", tasks)).unwrap();
        let outcome = handle.wait().await;

        let expected: Vec<TaskOutcome> = (0..20u8).map(|i| TaskOutcome::Value(vec![i])).collect();
        assert_eq!(outcome.outcomes(), expected.as_slice());
        assert!(ctx.queue().is_empty());
        ctx.shutdown().await;
        assert!(ctx.channels().is_empty());
        assert_eq!(ctx.statistics().connected_nodes(), 0);
    }

    #[tokio::test]
    async fn stored_jobs_can_be_resubmitted() {
        let store = Arc::new(MemoryJobStore::new());
        let ctx = SchedulerContext::builder(Arc::new(Echo))
            .with_store(store.clone())
            .build()
            .unwrap();

        let spec = JobSpec::new("kept", vec![Task::new(b"x".to_vec())]);
        let id = spec.id;
        store.store(&spec).unwrap();
        let handle = ctx.resubmit_stored(&id).unwrap().unwrap();
        assert_eq!(handle.id(), id);
        assert!(ctx.resubmit_stored(&grid_model::JobId::new()).unwrap().is_none());
    }
}
