//! `tdm add` – queue a new transfer job.

use anyhow::{Context, Result};
use tdm_core::config::TdmConfig;
use tdm_core::job_db::JobDb;
use tdm_core::DownloadRequest;

use crate::cli::{offline_manager, SourceArgs};

pub async fn run_add(cfg: &TdmConfig, db: JobDb, user: &str, target: &str, source: SourceArgs) -> Result<()> {
    let request = if let Some(magnet) = source.magnet {
        DownloadRequest::magnet(user, target, &magnet)
    } else if let Some(url) = source.url {
        DownloadRequest::descriptor_url(user, target, &url)
    } else if let Some(path) = source.file {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.torrent".to_string());
        DownloadRequest::uploaded(user, target, &name, bytes)
    } else {
        anyhow::bail!("one of --magnet, --url or --file is required");
    };

    // Rows are picked up by the next `tdm run` (or a running one's queued sweep).
    let manager = offline_manager(cfg, db)?;
    let id = manager.submit(request).await?;
    println!("Added job {id} for {user}/{target}");
    Ok(())
}
