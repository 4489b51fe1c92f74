//! Seam to the layer that moves slices to nodes.
//!
//! Framing, serialization and sockets live behind [`Transport`]; the
//! scheduler only sees one `send` future per dispatch.

use std::time::Duration;

use async_trait::async_trait;
use grid_model::{ChannelId, TaskOutcome};

use crate::{
    error::DispatchError,
    queue::{Dispatch, DispatchId},
};

/// What a node sent back for one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceReply {
    /// One outcome per task, in slice order.
    pub outcomes: Vec<TaskOutcome>,
    /// Time spent executing on the node, when reported.
    pub execution_time: Option<Duration>,
}

impl SliceReply {
    pub fn new(outcomes: Vec<TaskOutcome>) -> Self {
        Self {
            outcomes,
            execution_time: None,
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed);
        self
    }
}

/// Delivers slices to nodes.
///
/// `send` resolves exactly once per dispatch. Per-task failures belong in
/// [`SliceReply::outcomes`]; an `Err` means the slice as a whole did not run.
/// Returning [`DispatchError::ChannelLost`] detaches the channel.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, channel: ChannelId, dispatch: &Dispatch) -> Result<SliceReply, DispatchError>;

    /// Asks the node to stop a slice the scheduler gave up on. Best effort.
    async fn abort(&self, _channel: ChannelId, _dispatch: DispatchId) {}
}
