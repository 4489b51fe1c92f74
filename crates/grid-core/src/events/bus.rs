use tokio::sync::broadcast;

use super::JobEvent;

/// Bounded broadcast feed of [`JobEvent`]s.
///
/// Cloning is cheap; all clones publish into the same ring buffer.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Never blocks; the event is dropped when nobody listens.
    pub fn publish(&self, ev: JobEvent) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    #[inline]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
