use serde::{Deserialize, Serialize};

/// The smallest independently executable piece of a job.
///
/// The scheduler never looks inside the payload; encoding it is the transport's business.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Optional human readable label, used in logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Opaque task body.
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Task {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            payload: payload.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
