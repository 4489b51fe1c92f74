mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestTransport, context, eventually, manual, tasks, values};
use grid_core::{JobEventKind, LoadBalancingConfig};
use grid_model::{ChannelId, JobOutcome, JobSelector, JobSla, JobSpec};

#[tokio::test(start_paused = true)]
async fn expired_slice_is_retried_within_bound() {
    let transport = Arc::new(TestTransport::new().hang_first(1));
    let ctx = context(Arc::clone(&transport), manual(3));
    ctx.attach_node(ChannelId::new(), None);

    let spec = JobSpec::new("retry", tasks(3))
        .with_sla(JobSla::default().with_dispatch_timeout(50, 1));
    let outcome = ctx.submit(spec).unwrap().wait().await;

    assert_eq!(outcome.outcomes(), values(3).as_slice());
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.aborted().len(), 1);
    assert_eq!(ctx.statistics().snapshot().get("expirations").unwrap().count, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_expiration_becomes_task_failure() {
    let transport = Arc::new(TestTransport::new().hang_first(usize::MAX));
    let ctx = context(Arc::clone(&transport), manual(2));
    ctx.attach_node(ChannelId::new(), None);

    let spec = JobSpec::new("stuck", tasks(2))
        .with_sla(JobSla::default().with_dispatch_timeout(20, 2));
    let outcome = ctx.submit(spec).unwrap().wait().await;

    assert_eq!(transport.calls(), 3);
    for o in outcome.outcomes() {
        assert!(o.is_failure());
    }
}

#[tokio::test(start_paused = true)]
async fn default_dispatch_timeout_applies_to_jobs_without_one() {
    let transport = Arc::new(TestTransport::new().hang_first(usize::MAX));
    let mut config = manual(1);
    config.default_dispatch_timeout_ms = Some(30);
    let ctx = context(Arc::clone(&transport), config);
    ctx.attach_node(ChannelId::new(), None);

    let outcome = ctx.submit(JobSpec::new("j", tasks(1))).unwrap().wait().await;
    assert!(outcome.outcomes()[0].is_failure());
}

#[tokio::test]
async fn lost_channel_returns_its_slice_to_the_pool() {
    let transport = Arc::new(TestTransport::new());
    let ctx = context(Arc::clone(&transport), manual(5));
    let lost = ChannelId::new();
    transport.lose(lost);

    let handle = ctx.submit(JobSpec::new("j", tasks(5))).unwrap();
    ctx.attach_node(lost, None);
    eventually(|| !ctx.channels().contains(&lost)).await;
    assert_eq!(ctx.statistics().connected_nodes(), 0);
    assert_eq!(ctx.lifecycle().job_info(&handle.id()).unwrap().remaining_tasks, 5);

    let healthy = ChannelId::new();
    ctx.attach_node(healthy, None);
    assert_eq!(handle.wait().await.outcomes(), values(5).as_slice());
    assert!(transport.sent().iter().all(|s| s.channel == healthy));
    ctx.shutdown().await;
}

#[tokio::test]
async fn detaching_a_busy_channel_requeues_its_tasks() {
    let transport = Arc::new(TestTransport::new().hang_first(1));
    let ctx = context(Arc::clone(&transport), manual(4));
    let first = ChannelId::new();
    ctx.attach_node(first, None);

    let handle = ctx.submit(JobSpec::new("j", tasks(4))).unwrap();
    eventually(|| transport.calls() == 1).await;
    assert!(ctx.detach_node(first).await);
    assert!(!ctx.detach_node(first).await);
    assert_eq!(ctx.lifecycle().job_info(&handle.id()).unwrap().in_flight, 0);

    ctx.attach_node(ChannelId::new(), None);
    assert_eq!(handle.wait().await.outcomes(), values(4).as_slice());
    ctx.shutdown().await;
}

#[tokio::test]
async fn cancel_aborts_in_flight_work() {
    let transport = Arc::new(TestTransport::new().hang_first(usize::MAX));
    let ctx = context(Arc::clone(&transport), manual(2));
    let mut events = ctx.lifecycle().subscribe();
    ctx.attach_node(ChannelId::new(), None);

    let handle = ctx.submit(JobSpec::new("doomed", tasks(6))).unwrap();
    let id = handle.id();
    eventually(|| transport.calls() == 1).await;

    assert_eq!(ctx.lifecycle().cancel(&JobSelector::id(id)), vec![id]);
    assert!(ctx.lifecycle().cancel(&JobSelector::id(id)).is_empty());
    assert_eq!(handle.wait().await, JobOutcome::Cancelled);
    eventually(|| transport.aborted().len() == 1).await;
    assert!(ctx.queue().is_empty());

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert_eq!(kinds.first(), Some(&JobEventKind::Queued));
    assert_eq!(kinds.last(), Some(&JobEventKind::Ended));
    ctx.shutdown().await;
}

#[tokio::test]
async fn suspend_with_requeue_then_resume() {
    let transport = Arc::new(TestTransport::new().hang_first(1));
    let ctx = context(Arc::clone(&transport), manual(4));
    ctx.attach_node(ChannelId::new(), None);

    let handle = ctx.submit(JobSpec::new("paused", tasks(4))).unwrap();
    let sel = JobSelector::id(handle.id());
    eventually(|| transport.calls() == 1).await;

    assert_eq!(ctx.lifecycle().suspend(&sel, true).len(), 1);
    eventually(|| transport.aborted().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.calls(), 1, "suspended job is not dispatched");

    assert_eq!(ctx.lifecycle().resume(&sel).len(), 1);
    assert_eq!(handle.wait().await.outcomes(), values(4).as_slice());
    assert_eq!(transport.sent()[1].indices, vec![0, 1, 2, 3]);
    ctx.shutdown().await;
}

#[tokio::test]
async fn reconfiguration_reaches_channels_but_not_overrides() {
    let transport = Arc::new(TestTransport::new());
    let ctx = context(Arc::clone(&transport), manual(1));
    let plain = ChannelId::new();
    let pinned = ChannelId::new();
    ctx.attach_node(plain, None);
    ctx.attach_node(pinned, Some(&LoadBalancingConfig::new("manual").with_param("size", 3)));
    assert!(ctx.channels().info(&pinned).unwrap().overridden);

    ctx.update_load_balancing(LoadBalancingConfig::new("adaptive")).unwrap();
    eventually(|| ctx.channels().info(&plain).is_some_and(|i| i.algorithm == "adaptive")).await;
    assert_eq!(ctx.channels().info(&pinned).unwrap().algorithm, "manual");

    assert!(ctx.update_load_balancing(LoadBalancingConfig::new("bogus")).is_err());
    assert_eq!(ctx.bundlers().current_config().algorithm, "adaptive");
    ctx.shutdown().await;
}
