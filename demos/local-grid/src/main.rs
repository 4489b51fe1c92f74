use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use grid_core::{
    Dispatch, DispatchError, LoadBalancingConfig, SchedulerConfig, SchedulerContext, SliceReply,
    Transport,
};
use grid_model::{
    ChannelId, ExecutionPolicy, JobSelector, JobSla, JobSpec, NodeAttributes, Task, TaskOutcome,
};
use grid_observe::{EventLog, LoggerConfig, init_logger};
use grid_prometheus::{Encoder, PrometheusExporter, TextEncoder};

/// In-process nodes: each channel sleeps a fixed time per task, then sums the payload bytes.
struct SimulatedNodes {
    per_task: HashMap<ChannelId, Duration>,
}

#[async_trait]
impl Transport for SimulatedNodes {
    async fn send(&self, channel: ChannelId, d: &Dispatch) -> Result<SliceReply, DispatchError> {
        let per_task = self
            .per_task
            .get(&channel)
            .copied()
            .ok_or(DispatchError::ChannelLost(channel))?;
        let started = Instant::now();
        tokio::time::sleep(per_task * d.len() as u32).await;

        let outcomes = d
            .tasks
            .iter()
            .map(|t| match t.payload.first() {
                Some(0) => TaskOutcome::Failure("zero seed".into()),
                _ => {
                    let sum: u64 = t.payload.iter().map(|b| u64::from(*b)).sum();
                    TaskOutcome::Value(sum.to_be_bytes().to_vec())
                }
            })
            .collect();
        Ok(SliceReply::new(outcomes).with_execution_time(started.elapsed()))
    }
}

fn job(name: &str, tasks: usize, priority: i32) -> JobSpec {
    let tasks = (0..tasks)
        .map(|i| Task::new(vec![(i % 251) as u8, 1, 2, 3]).with_name(format!("{name}-{i}")))
        .collect();
    JobSpec::new(name, tasks)
        .with_sla(JobSla::default().with_priority(priority).with_max_nodes(3))
        .with_metadata("demo", "local-grid")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger(&LoggerConfig::default().with_level("info,grid_core=debug"))?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            SchedulerConfig::from_json(&raw)?
        }
        None => SchedulerConfig::default(),
    };

    let fast = ChannelId::new();
    let medium = ChannelId::new();
    let slow = ChannelId::new();
    let transport = Arc::new(SimulatedNodes {
        per_task: HashMap::from([
            (fast, Duration::from_millis(2)),
            (medium, Duration::from_millis(5)),
            (slow, Duration::from_millis(12)),
        ]),
    });

    let ctx = SchedulerContext::builder(transport)
        .with_config(config)
        .build()?;
    info!(algorithms = ?ctx.bundlers().algorithm_names(), "scheduler built");

    let shutdown = CancellationToken::new();
    let event_log = EventLog::spawn(ctx.queue().events(), shutdown.child_token());
    let exporter = PrometheusExporter::new()?;
    let poller = exporter.spawn_poller(
        Arc::clone(ctx.statistics()),
        ctx.config().stats_poll_interval(),
        shutdown.child_token(),
    );

    let tier = NodeAttributes::from([("tier".to_string(), "fast".to_string())]);
    ctx.attach_node_with_attributes(fast, None, tier);
    ctx.attach_node(medium, None);
    let pinned = LoadBalancingConfig::new("manual").with_param("size", 4);
    ctx.attach_node(slow, Some(&pinned));

    let index = job("index", 200, 5);
    let mut report = job("report", 100, 1);
    report.sla = report
        .sla
        .with_dependency(index.id)
        .with_policy(ExecutionPolicy::equal("tier", "fast"))
        .with_job_expiration(60_000);
    let handles = vec![
        ctx.submit(job("render", 400, 1))?,
        ctx.submit(index)?,
        ctx.submit(report)?,
    ];
    ctx.lifecycle()
        .update_priority(&JobSelector::Name("report".into()), 3);

    for h in handles {
        let id = h.id();
        let outcome = h.wait().await;
        let failed = outcome.outcomes().iter().filter(|o| o.is_failure()).count();
        info!(job = %id, tasks = outcome.outcomes().len(), failed, "job finished");
    }

    for ch in ctx.channels().list() {
        info!(
            channel = %ch.id,
            algorithm = ch.algorithm,
            overridden = ch.overridden,
            dispatches = ch.dispatches,
            last_size = ch.last_size,
            mean_ms = ch.mean_time_ms,
            "channel summary"
        );
    }
    for (key, value) in ctx.lifecycle().snapshot().to_flat_map() {
        info!(key = %key, value, "statistic");
    }

    exporter.update(&ctx.statistics().snapshot());
    let mut buf = Vec::new();
    TextEncoder::new().encode(&exporter.gather(), &mut buf)?;
    println!("{}", String::from_utf8_lossy(&buf));

    ctx.shutdown().await;
    shutdown.cancel();
    let _ = poller.await;
    let logged = event_log.await.unwrap_or_default();
    info!(events = logged, "demo finished");
    Ok(())
}
