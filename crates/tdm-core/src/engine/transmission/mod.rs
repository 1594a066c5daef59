//! [`TransferEngine`] backed by a Transmission daemon over its JSON-RPC API.

mod poll;
mod rpc;
mod types;

use super::{
    update_channel, EngineError, LoadedTransfer, Locator, StartedTransfer, TransferEngine,
    UpdateSource,
};
use crate::config::TdmConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rpc::RpcClient;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use types::AddReply;

/// Metadata is checked at this interval (or the poll interval, if shorter) while a start is pending.
const METADATA_CHECK: Duration = Duration::from_millis(500);

pub struct TransmissionEngine {
    rpc: RpcClient,
    download_dir: Option<PathBuf>,
    metadata_timeout: Duration,
    poll_interval: Duration,
    update_buffer: usize,
}

impl TransmissionEngine {
    pub fn new(cfg: &TdmConfig) -> Self {
        Self {
            rpc: RpcClient::new(&cfg.engine),
            download_dir: cfg.download_dir.clone(),
            metadata_timeout: cfg.metadata_timeout(),
            poll_interval: cfg.engine.poll_interval(),
            update_buffer: cfg.update_buffer,
        }
    }

    fn add_arguments(&self, locator: &Locator) -> Value {
        let mut args = json!({ "paused": false });
        if let Some(dir) = &self.download_dir {
            args["download-dir"] = json!(dir.to_string_lossy());
        }
        match locator {
            Locator::Magnet(uri) | Locator::DescriptorUrl(uri) => args["filename"] = json!(uri),
            Locator::DescriptorBytes(bytes) => args["metainfo"] = json!(STANDARD.encode(bytes)),
        }
        args
    }

    async fn wait_for_metadata(&self, id: i64) -> Result<(), EngineError> {
        let check = self.poll_interval.min(METADATA_CHECK);
        let wait = async {
            loop {
                match self.rpc.torrent(id).await? {
                    Some(t) if t.has_metadata() => return Ok::<(), EngineError>(()),
                    Some(_) => tokio::time::sleep(check).await,
                    None => {
                        return Err(EngineError::Rejected(
                            "torrent vanished while fetching metadata".to_string(),
                        ))
                    }
                }
            }
        };
        match tokio::time::timeout(self.metadata_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = self.remove(id).await {
                    tracing::warn!(torrent = id, error = %e, "could not unload torrent after metadata timeout");
                }
                Err(EngineError::MetadataTimeout(self.metadata_timeout.as_secs()))
            }
        }
    }

    async fn remove(&self, id: i64) -> Result<(), EngineError> {
        self.rpc
            .act("torrent-remove", id, Some(("delete-local-data", json!(false))))
            .await
    }

    fn spawn_poll(&self, id: i64) -> UpdateSource {
        let (sink, source) = update_channel(self.update_buffer);
        tokio::spawn(poll::poll_transfer(
            self.rpc.clone(),
            id,
            sink,
            self.poll_interval,
        ));
        source
    }
}

fn parse_id(transfer_id: &str) -> Result<i64, EngineError> {
    transfer_id
        .trim()
        .parse::<i64>()
        .map_err(|_| EngineError::UnknownTransfer(transfer_id.to_string()))
}

#[async_trait]
impl TransferEngine for TransmissionEngine {
    async fn start(&self, locator: &Locator) -> Result<StartedTransfer, EngineError> {
        let reply = self.rpc.call("torrent-add", self.add_arguments(locator)).await?;
        let added: AddReply = serde_json::from_value(reply)
            .map_err(|e| EngineError::Rejected(format!("torrent-add reply: {}", e)))?;
        let torrent = added.into_torrent()?;
        tracing::debug!(torrent = torrent.id, kind = locator.kind(), "torrent added; waiting for metadata");

        self.wait_for_metadata(torrent.id).await?;

        Ok(StartedTransfer {
            transfer_id: torrent.id.to_string(),
            info_hash: Some(torrent.hash_string),
            updates: self.spawn_poll(torrent.id),
        })
    }

    async fn pause(&self, transfer_id: &str) -> Result<(), EngineError> {
        self.rpc.act("torrent-stop", parse_id(transfer_id)?, None).await
    }

    async fn resume(&self, transfer_id: &str) -> Result<(), EngineError> {
        self.rpc.act("torrent-start", parse_id(transfer_id)?, None).await
    }

    async fn cancel(&self, transfer_id: &str) -> Result<(), EngineError> {
        self.remove(parse_id(transfer_id)?).await
    }

    async fn list_loaded(&self) -> Result<Vec<LoadedTransfer>, EngineError> {
        self.rpc.loaded().await
    }

    async fn attach(&self, transfer_id: &str) -> Result<UpdateSource, EngineError> {
        let id = parse_id(transfer_id)?;
        if self.rpc.torrent(id).await?.is_none() {
            return Err(EngineError::UnknownTransfer(transfer_id.to_string()));
        }
        Ok(self.spawn_poll(id))
    }
}
