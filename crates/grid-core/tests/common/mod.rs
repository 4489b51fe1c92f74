#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use grid_core::{
    Dispatch, DispatchError, DispatchId, LoadBalancingConfig, SchedulerConfig, SchedulerContext,
    SliceReply, Transport,
};
use grid_model::{ChannelId, JobId, Task, TaskOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub channel: ChannelId,
    pub job: JobId,
    pub indices: Vec<usize>,
}

/// Echoes each task payload back as its value.
#[derive(Default)]
pub struct TestTransport {
    delay: Duration,
    hang_first: usize,
    calls: AtomicUsize,
    lost: Mutex<HashSet<ChannelId>>,
    failing: Mutex<HashSet<usize>>,
    sent: Mutex<Vec<Sent>>,
    aborted: Mutex<Vec<DispatchId>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first `n` sends never answer.
    pub fn hang_first(mut self, n: usize) -> Self {
        self.hang_first = n;
        self
    }

    /// Sends on `channel` fail with `ChannelLost`.
    pub fn lose(&self, channel: ChannelId) {
        self.lost.lock().unwrap().insert(channel);
    }

    /// Task at `index` reports a failure.
    pub fn fail_task(&self, index: usize) {
        self.failing.lock().unwrap().insert(index);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn aborted(&self) -> Vec<DispatchId> {
        self.aborted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for TestTransport {
    async fn send(&self, channel: ChannelId, d: &Dispatch) -> Result<SliceReply, DispatchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.lost.lock().unwrap().contains(&channel) {
            return Err(DispatchError::ChannelLost(channel));
        }
        self.sent.lock().unwrap().push(Sent {
            channel,
            job: d.job,
            indices: d.indices.clone(),
        });
        if call < self.hang_first {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self.failing.lock().unwrap().clone();
        let outcomes = d
            .indices
            .iter()
            .zip(&d.tasks)
            .map(|(i, t)| {
                if failing.contains(i) {
                    TaskOutcome::Failure(format!("task {i} failed"))
                } else {
                    TaskOutcome::Value(t.payload.clone())
                }
            })
            .collect();
        Ok(SliceReply::new(outcomes).with_execution_time(self.delay / 2))
    }

    async fn abort(&self, _channel: ChannelId, dispatch: DispatchId) {
        self.aborted.lock().unwrap().push(dispatch);
    }
}

pub fn tasks(n: usize) -> Vec<Task> {
    (0..n).map(|i| Task::new((i as u32).to_be_bytes().to_vec())).collect()
}

pub fn values(n: usize) -> Vec<TaskOutcome> {
    (0..n)
        .map(|i| TaskOutcome::Value((i as u32).to_be_bytes().to_vec()))
        .collect()
}

pub fn manual(size: usize) -> SchedulerConfig {
    SchedulerConfig::default()
        .with_load_balancing(LoadBalancingConfig::new("manual").with_param("size", size))
}

pub fn context(transport: Arc<TestTransport>, config: SchedulerConfig) -> SchedulerContext {
    SchedulerContext::builder(transport)
        .with_config(config)
        .build()
        .unwrap()
}

/// Polls `cond` until it holds, failing after five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
