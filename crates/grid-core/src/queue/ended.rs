use std::collections::{HashMap, VecDeque};

use grid_model::JobId;

/// How many ended jobs are remembered for dependency checks.
pub(super) const HISTORY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Ending {
    Completed,
    Cancelled,
}

/// Bounded record of how recent jobs left the queue.
///
/// A dependent job submitted after its dependency was forgotten waits as if
/// the dependency had never been submitted.
#[derive(Debug)]
pub(super) struct EndedJobs {
    by_id: HashMap<JobId, Ending>,
    order: VecDeque<JobId>,
    capacity: usize,
}

impl Default for EndedJobs {
    fn default() -> Self {
        Self::with_capacity(HISTORY)
    }
}

impl EndedJobs {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_id: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, id: JobId, ending: Ending) {
        if self.by_id.insert(id, ending).is_some() {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.by_id.remove(&oldest);
        }
    }

    #[inline]
    pub fn get(&self, id: &JobId) -> Option<Ending> {
        self.by_id.get(id).copied()
    }
}
