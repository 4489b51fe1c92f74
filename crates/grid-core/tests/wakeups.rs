mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{TestTransport, context, eventually, manual, tasks, values};
use grid_core::SchedulerConfig;
use grid_model::{ChannelId, JobSelector, JobSla, JobSpec};

/// Idle channels would sleep for a minute without a wake-up.
fn slow_poll(size: usize) -> SchedulerConfig {
    let mut config = manual(size);
    config.idle_poll_ms = 60_000;
    config
}

#[tokio::test]
async fn resume_wakes_an_idle_channel() {
    let transport = Arc::new(TestTransport::new());
    let ctx = context(Arc::clone(&transport), slow_poll(4));
    ctx.attach_node(ChannelId::new(), None);

    let handle = ctx
        .submit(JobSpec::new("held", tasks(4)).with_sla(JobSla::default().with_suspended(true)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.calls(), 0);

    assert_eq!(ctx.lifecycle().resume(&JobSelector::id(handle.id())).len(), 1);
    let outcome = tokio::time::timeout(Duration::from_millis(500), handle.wait())
        .await
        .expect("resume did not reach the idle channel");
    assert_eq!(outcome.outcomes(), values(4).as_slice());
    ctx.shutdown().await;
}

#[tokio::test]
async fn raising_max_nodes_wakes_an_idle_channel() {
    let transport = Arc::new(TestTransport::new().hang_first(1));
    let ctx = context(Arc::clone(&transport), slow_poll(2));
    ctx.attach_node(ChannelId::new(), None);
    ctx.attach_node(ChannelId::new(), None);

    let handle = ctx
        .submit(JobSpec::new("narrow", tasks(4)).with_sla(JobSla::default().with_max_nodes(1)))
        .unwrap();
    eventually(|| transport.calls() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.calls(), 1, "second channel stays idle at max nodes");

    ctx.lifecycle().update_max_nodes(&JobSelector::id(handle.id()), 2);
    tokio::time::timeout(Duration::from_millis(500), async {
        eventually(|| transport.calls() >= 2).await
    })
    .await
    .expect("max-nodes change did not reach the idle channel");
    ctx.shutdown().await;
}

#[tokio::test]
async fn priority_change_is_taken_by_the_next_dispatch() {
    let transport = Arc::new(TestTransport::new().with_delay(Duration::from_millis(100)));
    let ctx = context(Arc::clone(&transport), slow_poll(1));

    let low = ctx.submit(JobSpec::new("low", tasks(3))).unwrap();
    let high = ctx.submit(JobSpec::new("high", tasks(3))).unwrap();
    ctx.attach_node(ChannelId::new(), None);
    eventually(|| transport.calls() == 1).await;

    ctx.lifecycle().update_priority(&JobSelector::id(high.id()), 10);
    let high_id = high.id();
    tokio::time::timeout(Duration::from_secs(1), high.wait())
        .await
        .expect("priority change did not reach the channel");

    let order: Vec<_> = transport.sent().iter().map(|s| s.job).collect();
    assert_eq!(order[0], low.id());
    assert_eq!(&order[1..4], &[high_id; 3]);
    assert_eq!(low.wait().await.outcomes(), values(3).as_slice());
    ctx.shutdown().await;
}
