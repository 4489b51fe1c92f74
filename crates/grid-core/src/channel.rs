//! Book-keeping of attached node channels.
//!
//! The registry owns what management tooling may read about a channel; the
//! channel's bundler and performance tracker stay inside its worker task.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use grid_model::ChannelId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Read-only view of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    /// A slice is on the node right now.
    pub busy: bool,
    /// The bundler came from a node-supplied configuration.
    pub overridden: bool,
    pub algorithm: &'static str,
    /// Size of the last slice sent.
    pub last_size: usize,
    /// Slices completed on this channel.
    pub dispatches: u64,
    /// Moving-average time per task, in milliseconds.
    pub mean_time_ms: f64,
}

impl ChannelInfo {
    pub fn new(id: ChannelId, algorithm: &'static str, overridden: bool, mean_time_ms: f64) -> Self {
        Self {
            id,
            busy: false,
            overridden,
            algorithm,
            last_size: 0,
            dispatches: 0,
            mean_time_ms,
        }
    }
}

#[derive(Debug)]
struct ChannelSlot {
    info: ChannelInfo,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Worker handles of a removed channel.
#[derive(Debug)]
pub(crate) struct Detached {
    pub token: CancellationToken,
    pub handle: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<ChannelId, ChannelSlot>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ChannelId, ChannelSlot>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` if the channel is already registered.
    pub(crate) fn insert(&self, info: ChannelInfo, token: CancellationToken) -> bool {
        let mut map = self.lock();
        if map.contains_key(&info.id) {
            return false;
        }
        map.insert(
            info.id,
            ChannelSlot {
                info,
                token,
                handle: None,
            },
        );
        true
    }

    /// Attaches the worker handle, unless the worker already removed itself.
    pub(crate) fn set_handle(&self, id: ChannelId, handle: JoinHandle<()>) {
        if let Some(slot) = self.lock().get_mut(&id) {
            slot.handle = Some(handle);
        }
    }

    pub(crate) fn update(&self, id: ChannelId, f: impl FnOnce(&mut ChannelInfo)) {
        if let Some(slot) = self.lock().get_mut(&id) {
            f(&mut slot.info);
        }
    }

    pub(crate) fn remove(&self, id: ChannelId) -> Option<Detached> {
        self.lock().remove(&id).map(|slot| Detached {
            token: slot.token,
            handle: slot.handle,
        })
    }

    pub(crate) fn drain(&self) -> Vec<Detached> {
        self.lock()
            .drain()
            .map(|(_, slot)| Detached {
                token: slot.token,
                handle: slot.handle,
            })
            .collect()
    }

    pub fn info(&self, id: &ChannelId) -> Option<ChannelInfo> {
        self.lock().get(id).map(|s| s.info.clone())
    }

    pub fn list(&self) -> Vec<ChannelInfo> {
        let mut all: Vec<ChannelInfo> = self.lock().values().map(|s| s.info.clone()).collect();
        all.sort_by_key(|i| i.id);
        all
    }

    pub fn contains(&self, id: &ChannelId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
