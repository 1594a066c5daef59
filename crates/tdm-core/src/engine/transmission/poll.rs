//! Per-transfer sampling loop feeding a monitor.

use super::rpc::RpcClient;
use crate::engine::UpdateSink;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Samples torrent `id` every `interval` until it completes, fails, disappears
/// from the daemon, or the monitor drops its end of the stream.
pub(super) async fn poll_transfer(rpc: RpcClient, id: i64, sink: UpdateSink, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if sink.is_closed() {
            tracing::debug!(torrent = id, "monitor gone; stopping poll");
            return;
        }
        let torrent = match rpc.torrent(id).await {
            Ok(Some(t)) => t,
            Ok(None) => {
                tracing::info!(torrent = id, "torrent no longer loaded; closing update stream");
                return;
            }
            Err(e) => {
                tracing::warn!(torrent = id, error = %e, "poll failed; retrying next tick");
                continue;
            }
        };
        let update = torrent.to_update();
        if update.status.is_final() {
            sink.push(update).await;
            return;
        }
        if !sink.try_push(update) {
            tracing::trace!(torrent = id, "update buffer full; sample dropped");
        }
    }
}
