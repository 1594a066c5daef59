//! Control socket protocol against an unstarted coordinator.

use crate::cli::commands::ControlAction;
use crate::cli::control_socket::{handle_line, reply_to_result, send_command, spawn_control_listener};
use crate::cli::offline_manager;
use std::sync::Arc;
use tdm_core::config::TdmConfig;
use tdm_core::job_db::{JobDb, JobState};
use tdm_core::{DownloadManager, DownloadRequest};

async fn manager(dir: &std::path::Path) -> DownloadManager {
    let cfg = TdmConfig {
        descriptor_dir: Some(dir.join("descriptors")),
        ..TdmConfig::default()
    };
    let db = JobDb::open_at(dir.join("jobs.db")).await.unwrap();
    offline_manager(&cfg, db).unwrap()
}

#[tokio::test]
async fn request_lines_are_dispatched() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager(dir.path()).await;
    let id = m
        .submit(DownloadRequest::magnet("u", "t", "magnet:?xt=urn:btih:aa"))
        .await
        .unwrap();

    assert_eq!(handle_line(&m, &format!("pause {}", id)).await, "ok");
    assert_eq!(m.get(id).await.unwrap().state, JobState::Paused);
    assert_eq!(handle_line(&m, &format!("cancel {}", id)).await, "ok");
    assert_eq!(m.get(id).await.unwrap().state, JobState::Cancelled);

    let reply = handle_line(&m, &format!("resume {}", id)).await;
    assert!(reply.starts_with("error cannot resume"), "{}", reply);
    assert!(handle_line(&m, "pause 999").await.starts_with("error job 999 not found"));
    assert!(handle_line(&m, "explode 1").await.starts_with("error unknown command"));
    assert!(handle_line(&m, "pause").await.starts_with("error malformed"));
    assert!(handle_line(&m, "pause x").await.starts_with("error invalid job id"));
}

#[tokio::test]
async fn socket_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let m = Arc::new(manager(dir.path()).await);
    let id = m
        .submit(DownloadRequest::magnet("u", "t", "magnet:?xt=urn:btih:aa"))
        .await
        .unwrap();
    let path = dir.path().join("control.sock");
    let handle = spawn_control_listener(Arc::clone(&m), &path).unwrap();

    let reply = send_command(&path, ControlAction::Pause, id).await.unwrap();
    assert_eq!(reply.as_deref(), Some("ok"));
    assert_eq!(m.get(id).await.unwrap().state, JobState::Paused);

    let reply = send_command(&path, ControlAction::Cancel, 12345).await.unwrap().unwrap();
    assert!(reply_to_result(&reply).is_err());
    handle.abort();
}

#[tokio::test]
async fn missing_socket_means_no_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let reply = send_command(&dir.path().join("none.sock"), ControlAction::Pause, 1)
        .await
        .unwrap();
    assert!(reply.is_none());
}

#[test]
fn reply_parsing() {
    assert!(reply_to_result("ok\n").is_ok());
    let err = reply_to_result("error job 4 not found").unwrap_err();
    assert_eq!(err.to_string(), "job 4 not found");
    assert!(reply_to_result("what").is_err());
}
