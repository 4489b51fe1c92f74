use grid_core::EventBus;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::log_event;

/// Background task writing every lifecycle event to the log.
pub struct EventLog;

impl EventLog {
    /// Subscribes to `bus` and logs until `token` fires or the bus closes.
    ///
    /// Returns the number of events logged.
    pub fn spawn(bus: &EventBus, token: CancellationToken) -> JoinHandle<u64> {
        let rx = bus.subscribe();
        tokio::spawn(Self::run(rx, token))
    }

    async fn run(mut rx: Receiver<grid_core::JobEvent>, token: CancellationToken) -> u64 {
        let mut logged = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => {
                        log_event(&ev);
                        logged += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event log fell behind, events skipped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        logged
    }
}

#[cfg(test)]
mod tests {
    use grid_core::{JobEvent, JobEventKind};
    use grid_model::JobId;

    use super::*;
    use crate::message_for;

    #[tokio::test]
    async fn logs_until_cancelled() {
        let bus = EventBus::new(16);
        let token = CancellationToken::new();
        let handle = EventLog::spawn(&bus, token.clone());

        let job = JobId::new();
        bus.publish(JobEvent::new(JobEventKind::Queued, job).with_tasks(2));
        bus.publish(JobEvent::new(JobEventKind::Ended, job).with_reason("cancelled"));
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        token.cancel();
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stops_when_bus_is_dropped() {
        let bus = EventBus::new(4);
        let handle = EventLog::spawn(&bus, CancellationToken::new());
        drop(bus);
        assert_eq!(handle.await.unwrap(), 0);
    }

    #[test]
    fn every_kind_has_a_message() {
        for kind in [
            JobEventKind::Queued,
            JobEventKind::Dispatched,
            JobEventKind::Returned,
            JobEventKind::Ended,
            JobEventKind::Updated,
        ] {
            assert!(!message_for(kind).is_empty());
        }
    }
}
