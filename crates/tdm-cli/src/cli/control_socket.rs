//! Control socket: server (during `tdm run`) and client (for `tdm pause` etc.).
//! Protocol: one request line "<pause|resume|cancel> <id>", answered with
//! "ok" or "error <message>".

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tdm_core::DownloadManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::cli::commands::ControlAction;

const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply one request line to `manager` and return the reply line (without newline).
pub async fn handle_line(manager: &DownloadManager, line: &str) -> String {
    let mut parts = line.split_whitespace();
    let (Some(verb), Some(id), None) = (parts.next(), parts.next(), parts.next()) else {
        return format!("error malformed request: {:?}", line.trim());
    };
    let Some(action) = ControlAction::parse(verb) else {
        return format!("error unknown command: {}", verb);
    };
    let Ok(id) = id.parse::<i64>() else {
        return format!("error invalid job id: {}", id);
    };
    let result = match action {
        ControlAction::Pause => manager.pause(id).await,
        ControlAction::Resume => manager.resume(id).await,
        ControlAction::Cancel => manager.cancel(id).await,
    };
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error {}", e),
    }
}

/// Spawns a task that listens on `path` and dispatches each request line to `manager`.
pub fn spawn_control_listener(
    manager: Arc<DownloadManager>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = Arc::clone(&manager);
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let reply = handle_line(&manager, &line).await;
                            tracing::debug!(request = %line.trim(), reply = %reply, "control request");
                            if write.write_all(format!("{}\n", reply).as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one request and returns the reply line, or None if no coordinator
/// is listening on `socket_path`.
pub async fn send_command(socket_path: &Path, action: ControlAction, job_id: i64) -> Result<Option<String>> {
    if !socket_path.exists() {
        return Ok(None);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
            return Ok(None)
        }
        Err(e) => return Err(e).context("connect control socket"),
    };
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{} {}\n", action.verb(), job_id).as_bytes())
        .await?;
    let mut lines = BufReader::new(read).lines();
    let reply = tokio::time::timeout(REPLY_TIMEOUT, lines.next_line())
        .await
        .context("control socket reply timed out")??;
    Ok(reply)
}

/// `ok` → Ok, `error <message>` → Err(message).
pub fn reply_to_result(reply: &str) -> Result<()> {
    let reply = reply.trim();
    if reply == "ok" {
        return Ok(());
    }
    match reply.strip_prefix("error") {
        Some(msg) => anyhow::bail!("{}", msg.trim()),
        None => anyhow::bail!("unexpected control reply: {}", reply),
    }
}
