use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ClientId, JobId, JobSla, Task};

/// A client-submitted unit of work.
///
/// Task positions are fixed at submission; results come back in the same order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub id: JobId,
    pub name: String,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sla: JobSla,
    /// Free-form attributes, matched by [`JobSelector::Metadata`](crate::JobSelector).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Submitting client, if the job should follow that client's lifetime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientId>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            tasks,
            sla: JobSla::default(),
            metadata: BTreeMap::new(),
            client: None,
        }
    }

    pub fn with_sla(mut self, sla: JobSla) -> Self {
        self.sla = sla;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }

    #[inline]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}
