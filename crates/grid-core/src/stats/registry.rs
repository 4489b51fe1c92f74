use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use super::{Metric, MetricKind, StatisticsSnapshot};

pub const EXECUTION: &str = "execution";
pub const ROUND_TRIP: &str = "roundTrip";
pub const TRANSPORT: &str = "transport";
pub const QUEUE_TIME: &str = "queueTime";
pub const QUEUE_SIZE: &str = "queueSize";
pub const JOBS: &str = "jobs";
pub const DISPATCHES: &str = "dispatches";
pub const EXPIRATIONS: &str = "expirations";
pub const NODES: &str = "nodes";
pub const CLIENTS: &str = "clients";

#[inline]
fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Named counters and gauges shared by the whole driver.
///
/// Durations are recorded in milliseconds. Created once per
/// [`SchedulerContext`](crate::SchedulerContext); only [`reset`](Self::reset) clears it.
#[derive(Debug)]
pub struct StatisticsRegistry {
    execution: Metric,
    round_trip: Metric,
    transport: Metric,
    queue_time: Metric,
    queue_size: Metric,
    jobs: Metric,
    dispatches: Metric,
    expirations: Metric,
    nodes: Metric,
    clients: Metric,
}

impl Default for StatisticsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StatisticsRegistry {
    pub fn new() -> Self {
        Self {
            execution: Metric::new(EXECUTION, MetricKind::Sample),
            round_trip: Metric::new(ROUND_TRIP, MetricKind::Sample),
            transport: Metric::new(TRANSPORT, MetricKind::Sample),
            queue_time: Metric::new(QUEUE_TIME, MetricKind::Sample),
            queue_size: Metric::new(QUEUE_SIZE, MetricKind::Level),
            jobs: Metric::new(JOBS, MetricKind::Level),
            dispatches: Metric::new(DISPATCHES, MetricKind::Sample),
            expirations: Metric::new(EXPIRATIONS, MetricKind::Sample),
            nodes: Metric::new(NODES, MetricKind::Level),
            clients: Metric::new(CLIENTS, MetricKind::Level),
        }
    }

    fn all(&self) -> [&Metric; 10] {
        [
            &self.execution,
            &self.round_trip,
            &self.transport,
            &self.queue_time,
            &self.queue_size,
            &self.jobs,
            &self.dispatches,
            &self.expirations,
            &self.nodes,
            &self.clients,
        ]
    }

    /// `tasks` entered the not-yet-dispatched pool.
    pub fn task_queued(&self, tasks: usize) {
        self.queue_size.adjust(tasks as f64);
    }

    /// `tasks` left the pool after waiting `wait` since their job was queued.
    pub fn task_dequeued(&self, wait: Duration, tasks: usize) {
        self.queue_size.adjust(-(tasks as f64));
        self.queue_time.record(millis(wait) * tasks as f64, tasks as u64);
        self.dispatches.record(tasks as f64, 1);
    }

    /// Tasks of a finished job that were never dispatched.
    pub fn task_withdrawn(&self, tasks: usize) {
        if tasks > 0 {
            self.queue_size.adjust(-(tasks as f64));
        }
    }

    /// A slice of `tasks` ran for `exec` on the node, out of `round_trip` end to end.
    pub fn task_executed(&self, exec: Duration, round_trip: Duration, tasks: usize) {
        let n = tasks as u64;
        self.execution.record(millis(exec), n);
        self.round_trip.record(millis(round_trip), n);
        self.transport
            .record(millis(round_trip.saturating_sub(exec)), 1);
    }

    pub fn dispatch_expired(&self, tasks: usize) {
        self.expirations.record(tasks as f64, 1);
    }

    pub fn job_queued(&self) {
        self.jobs.adjust(1.0);
    }

    pub fn job_ended(&self) {
        self.jobs.adjust(-1.0);
    }

    pub fn node_connected(&self) {
        self.nodes.adjust(1.0);
    }

    pub fn node_disconnected(&self) {
        self.nodes.adjust(-1.0);
    }

    pub fn client_connected(&self) {
        self.clients.adjust(1.0);
    }

    pub fn client_disconnected(&self) {
        self.clients.adjust(-1.0);
    }

    /// Currently connected nodes.
    pub fn connected_nodes(&self) -> usize {
        self.nodes.latest().max(0.0) as usize
    }

    /// Tasks waiting for dispatch across all jobs.
    pub fn queued_tasks(&self) -> usize {
        self.queue_size.latest().max(0.0) as usize
    }

    /// Cluster-wide mean round-trip time per task, in milliseconds.
    pub fn mean_round_trip(&self) -> Option<f64> {
        self.round_trip.average()
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.all().into_iter().find(|m| m.name() == name)
    }

    /// Clears accumulated values. Levels (queue depth, connections) keep their current value.
    pub fn reset(&self) {
        for m in self.all() {
            m.reset();
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let metrics: BTreeMap<String, _> = self
            .all()
            .into_iter()
            .map(|m| (m.name().to_string(), m.snapshot()))
            .collect();
        StatisticsSnapshot {
            taken_at: SystemTime::now(),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_events_move_queue_size() {
        let stats = StatisticsRegistry::new();
        stats.task_queued(10);
        stats.task_dequeued(Duration::from_millis(20), 4);
        assert_eq!(stats.queued_tasks(), 6);

        let snap = stats.snapshot();
        let qt = snap.get(QUEUE_TIME).unwrap();
        assert_eq!(qt.count, 4);
        assert!((qt.average() - 20.0).abs() < 1e-9);
        assert_eq!(snap.get(DISPATCHES).unwrap().count, 1);
    }

    #[test]
    fn execution_splits_transport_time() {
        let stats = StatisticsRegistry::new();
        stats.task_executed(Duration::from_millis(80), Duration::from_millis(100), 4);
        let snap = stats.snapshot();
        assert!((snap.get(EXECUTION).unwrap().average() - 20.0).abs() < 1e-9);
        assert!((snap.get(ROUND_TRIP).unwrap().average() - 25.0).abs() < 1e-9);
        assert!((snap.get(TRANSPORT).unwrap().latest - 20.0).abs() < 1e-9);
        assert!((stats.mean_round_trip().unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn connection_levels() {
        let stats = StatisticsRegistry::new();
        stats.node_connected();
        stats.node_connected();
        stats.node_disconnected();
        stats.client_connected();
        assert_eq!(stats.connected_nodes(), 1);
        assert_eq!(stats.snapshot().get(CLIENTS).unwrap().latest, 1.0);
    }

    #[test]
    fn flat_map_has_derived_average() {
        let stats = StatisticsRegistry::new();
        stats.task_executed(Duration::from_millis(10), Duration::from_millis(10), 2);
        let flat = stats.snapshot().to_flat_map();
        assert_eq!(flat.get("execution.count"), Some(&2.0));
        assert!((flat["execution.avg"] - 5.0).abs() < 1e-9);
        assert!(flat.contains_key("nodes.latest"));
    }

    #[test]
    fn reset_clears_samples_only() {
        let stats = StatisticsRegistry::new();
        stats.node_connected();
        stats.task_executed(Duration::from_millis(10), Duration::from_millis(10), 1);
        stats.reset();
        assert!(stats.mean_round_trip().is_none());
        assert_eq!(stats.connected_nodes(), 1);
    }

    #[test]
    fn lookup_by_name() {
        let stats = StatisticsRegistry::new();
        assert_eq!(stats.metric(QUEUE_SIZE).unwrap().kind(), MetricKind::Level);
        assert!(stats.metric("nope").is_none());
    }
}
