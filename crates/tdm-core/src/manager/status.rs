//! Periodic status line, and the sweep that re-offers queued jobs which did
//! not fit in the admission queue.

use super::Shared;
use crate::job_db::JobState;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(super) async fn report_status(shared: Arc<Shared>, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(shared.cfg.status_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let active = shared.registry.len();
        if active > 0 {
            tracing::info!(
                active,
                queued = shared.queue.len(),
                free_slots = shared.slots.available_permits(),
                "transfers in progress"
            );
        }
        if shared.queue.is_empty() {
            sweep_queued(&shared).await;
        }
    }
}

/// Offer queued rows to an empty admission queue.
async fn sweep_queued(shared: &Shared) {
    let queued = match shared.db.find_by_states(&[JobState::Queued]).await {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::warn!(error = %e, "queued sweep failed");
            return;
        }
    };
    let mut offered = 0usize;
    for job in queued {
        if shared.registry.contains(job.id) {
            continue;
        }
        if shared.queue.try_enqueue(job.id).is_err() {
            break;
        }
        offered += 1;
    }
    if offered > 0 {
        tracing::debug!(offered, "re-offered queued jobs");
    }
}
