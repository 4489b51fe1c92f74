//! Optional persistence of queued jobs.
//!
//! The queue works fully in memory; a [`JobStore`] only mirrors what is
//! queued so a restarted driver can resubmit it.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use grid_model::{JobId, JobSpec};

use crate::error::CoreError;

/// Persistence collaborator.
///
/// Called while the queue lock is held: implementations must return quickly
/// and never call back into the scheduler.
pub trait JobStore: Send + Sync {
    fn store(&self, job: &JobSpec) -> Result<(), CoreError>;

    fn load(&self, id: &JobId) -> Result<Option<JobSpec>, CoreError>;

    fn remove(&self, id: &JobId) -> Result<(), CoreError>;

    /// Ids of every stored job.
    fn list(&self) -> Result<Vec<JobId>, CoreError>;
}

/// Process-local [`JobStore`].
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobSpec>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for MemoryJobStore {
    fn store(&self, job: &JobSpec) -> Result<(), CoreError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id, job.clone());
        Ok(())
    }

    fn load(&self, id: &JobId) -> Result<Option<JobSpec>, CoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn remove(&self, id: &JobId) -> Result<(), CoreError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<JobId>, CoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use grid_model::Task;

    use super::*;

    #[test]
    fn store_load_remove() {
        let store = MemoryJobStore::new();
        let job = JobSpec::new("j", vec![Task::new(b"x".to_vec())]);

        store.store(&job).unwrap();
        assert_eq!(store.load(&job.id).unwrap(), Some(job.clone()));
        assert_eq!(store.list().unwrap(), vec![job.id]);

        store.remove(&job.id).unwrap();
        assert!(store.load(&job.id).unwrap().is_none());
        assert!(store.is_empty());
    }
}
