//! `tdm run` – host the coordinator until Ctrl-C.

use anyhow::Result;
use std::sync::Arc;
use tdm_core::broadcast::{ChannelGateway, ProgressNotice};
use tdm_core::config::{self, TdmConfig};
use tdm_core::engine::transmission::TransmissionEngine;
use tdm_core::job_db::JobDb;
use tdm_core::DownloadManager;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::control_socket;

const NOTICE_BUFFER: usize = 256;

fn format_notice(user: &str, n: &ProgressNotice) -> String {
    let done_mib = n.downloaded_bytes as f64 / 1_048_576.0;
    let total_mib = n.total_bytes as f64 / 1_048_576.0;
    let rate_mib = n.download_rate as f64 / 1_048_576.0;
    let eta = n
        .eta_secs
        .map(|s| format!("{}s", s))
        .unwrap_or_else(|| "?".to_string());
    let mut line = format!(
        "[job {}] {}/{} {:<9} {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}  peers {}/{}",
        n.job_id,
        user,
        n.target_id,
        n.status,
        done_mib,
        total_mib,
        n.progress,
        rate_mib,
        eta,
        n.seeds,
        n.peers
    );
    if let Some(err) = &n.error {
        line.push_str("  error: ");
        line.push_str(err);
    }
    line
}

pub async fn run_coordinator(cfg: TdmConfig, db: JobDb, json: bool) -> Result<()> {
    let engine = Arc::new(TransmissionEngine::new(&cfg));
    let gateway = Arc::new(ChannelGateway::new(NOTICE_BUFFER));
    let manager = Arc::new(DownloadManager::new(cfg, db, engine, gateway.clone())?);

    let mut notices = gateway.subscribe_all();
    let printer = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(n) if json => match serde_json::to_string(&n.notice) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::debug!("notice encode: {}", e),
                },
                Ok(n) => println!("{}", format_notice(&n.user_id, &n.notice)),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "progress printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let recovery = manager.start();

    let socket_path = config::control_socket_path()?;
    let listener = match control_socket::spawn_control_listener(Arc::clone(&manager), &socket_path) {
        Ok(handle) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("control socket disabled: {:#}", e);
            None
        }
    };

    match recovery.await {
        Ok(report) => println!(
            "Recovery: {} re-attached, {} requeued, {} left queued",
            report.reattached, report.requeued, report.left_queued
        ),
        Err(e) => tracing::warn!("recovery task failed: {}", e),
    }

    println!("Running; press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    println!("Stopping...");

    if let Some(handle) = listener {
        handle.abort();
    }
    let _ = std::fs::remove_file(&socket_path);
    manager.stop().await;
    drop(manager);
    drop(gateway);
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_line_has_progress_and_error() {
        let n = ProgressNotice {
            job_id: 3,
            target_id: "game-1".into(),
            info_hash: None,
            name: None,
            status: "failed".into(),
            progress: 50.0,
            downloaded_bytes: 1_048_576,
            total_bytes: 2_097_152,
            download_rate: 0,
            upload_rate: 0,
            eta_secs: None,
            peers: 4,
            seeds: 1,
            error: Some("disk full".into()),
            updated_at: 0,
        };
        let line = format_notice("alice", &n);
        assert!(line.starts_with("[job 3] alice/game-1 failed"));
        assert!(line.contains("1.0 / 2.0 MiB (50.0%)"));
        assert!(line.contains("ETA ?"));
        assert!(line.ends_with("error: disk full"));
    }
}
