use grid_core::{JobEvent, JobEventKind};
use tracing::{debug, info, trace, warn};

#[inline]
pub fn message_for(kind: JobEventKind) -> &'static str {
    match kind {
        JobEventKind::Queued => "job queued",
        JobEventKind::Dispatched => "slice dispatched to node",
        JobEventKind::Returned => "slice returned from node",
        JobEventKind::Ended => "job ended",
        JobEventKind::Updated => "job SLA updated",
    }
}

/// Logs one lifecycle event at a level matching its weight.
pub fn log_event(e: &JobEvent) {
    let msg = message_for(e.kind);
    let reason = e.reason.as_deref().unwrap_or("");
    let channel = e.channel.map(|c| c.to_string()).unwrap_or_default();

    match e.kind {
        JobEventKind::Queued => debug!(seq = e.seq, job = %e.job, tasks = e.tasks, "{msg}"),
        JobEventKind::Dispatched => {
            trace!(seq = e.seq, job = %e.job, channel = %channel, tasks = e.tasks, "{msg}")
        }
        JobEventKind::Returned if e.reason.is_some() => {
            warn!(seq = e.seq, job = %e.job, channel = %channel, tasks = e.tasks, reason, "{msg}")
        }
        JobEventKind::Returned => {
            trace!(seq = e.seq, job = %e.job, channel = %channel, tasks = e.tasks, "{msg}")
        }
        JobEventKind::Ended => info!(seq = e.seq, job = %e.job, reason, "{msg}"),
        JobEventKind::Updated => debug!(seq = e.seq, job = %e.job, reason, "{msg}"),
    }
}
