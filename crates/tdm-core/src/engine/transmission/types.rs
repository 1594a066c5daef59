//! Transmission RPC payloads and their mapping onto progress samples.

use crate::engine::{EngineError, ProgressUpdate, TransferStatus};
use serde::Deserialize;
use serde_json::Value;

/// Fields requested for every progress sample.
pub(super) const TORRENT_FIELDS: &[&str] = &[
    "id",
    "hashString",
    "name",
    "status",
    "percentDone",
    "metadataPercentComplete",
    "sizeWhenDone",
    "leftUntilDone",
    "rateDownload",
    "rateUpload",
    "eta",
    "peersConnected",
    "peersSendingToUs",
    "error",
    "errorString",
];

/// Transmission's `error` code for a local (disk or permission) failure.
const LOCAL_ERROR: i64 = 3;

#[derive(Debug, Deserialize)]
pub(super) struct RpcReply {
    result: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl RpcReply {
    pub(super) fn into_arguments(self) -> Result<Value, EngineError> {
        if self.result != "success" {
            return Err(EngineError::Rejected(self.result));
        }
        Ok(self.arguments.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TorrentList<T> {
    #[serde(default = "Vec::new")]
    pub torrents: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoadedRow {
    pub id: i64,
    pub hash_string: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddedTorrent {
    pub id: i64,
    pub hash_string: String,
}

/// Reply to `torrent-add`. A torrent the daemon already holds comes back as a duplicate.
#[derive(Debug, Deserialize)]
pub(super) struct AddReply {
    #[serde(rename = "torrent-added")]
    added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    duplicate: Option<AddedTorrent>,
}

impl AddReply {
    pub(super) fn into_torrent(self) -> Result<AddedTorrent, EngineError> {
        self.added.or(self.duplicate).ok_or_else(|| {
            EngineError::Rejected("torrent-add reply named no torrent".to_string())
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct TorrentFields {
    pub id: i64,
    pub hash_string: String,
    pub name: Option<String>,
    /// 0 stopped, 1-2 checking, 3-4 download (queued/active), 5-6 seed (queued/active).
    pub status: i64,
    pub percent_done: f64,
    pub metadata_percent_complete: f64,
    pub size_when_done: i64,
    pub left_until_done: i64,
    pub rate_download: i64,
    pub rate_upload: i64,
    pub eta: i64,
    pub peers_connected: i64,
    pub peers_sending_to_us: i64,
    pub error: i64,
    pub error_string: String,
}

fn non_negative(v: i64) -> u64 {
    v.max(0) as u64
}

impl TorrentFields {
    pub(super) fn has_metadata(&self) -> bool {
        self.metadata_percent_complete >= 1.0
    }

    fn is_complete(&self) -> bool {
        self.has_metadata() && self.size_when_done > 0 && self.left_until_done == 0
    }

    pub(super) fn status(&self) -> TransferStatus {
        if self.error == LOCAL_ERROR {
            return TransferStatus::Failed;
        }
        if self.is_complete() {
            return TransferStatus::Completed;
        }
        match self.status {
            0 => TransferStatus::Paused,
            4 => TransferStatus::Downloading,
            _ => TransferStatus::Waiting,
        }
    }

    pub(super) fn to_update(&self) -> ProgressUpdate {
        let total = non_negative(self.size_when_done);
        let downloaded = non_negative(self.size_when_done - self.left_until_done.max(0));
        let error = (self.error != 0 && !self.error_string.is_empty())
            .then(|| self.error_string.clone());
        ProgressUpdate {
            info_hash: (!self.hash_string.is_empty()).then(|| self.hash_string.clone()),
            name: self.name.clone(),
            total_bytes: total,
            downloaded_bytes: downloaded,
            download_rate: non_negative(self.rate_download),
            upload_rate: non_negative(self.rate_upload),
            progress: (self.percent_done * 100.0).clamp(0.0, 100.0),
            status: self.status(),
            eta_secs: (self.eta >= 0).then(|| self.eta as u64),
            peers: non_negative(self.peers_connected) as u32,
            seeds: non_negative(self.peers_sending_to_us) as u32,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(v: Value) -> TorrentFields {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn downloading_sample_maps_counters() {
        let t = sample(json!({
            "id": 7,
            "hashString": "abcdef",
            "name": "ubuntu.iso",
            "status": 4,
            "percentDone": 0.25,
            "metadataPercentComplete": 1.0,
            "sizeWhenDone": 4000,
            "leftUntilDone": 3000,
            "rateDownload": 512,
            "rateUpload": 64,
            "eta": 6,
            "peersConnected": 9,
            "peersSendingToUs": 4,
            "error": 0,
            "errorString": ""
        }));
        let u = t.to_update();
        assert_eq!(u.status, TransferStatus::Downloading);
        assert_eq!(u.total_bytes, 4000);
        assert_eq!(u.downloaded_bytes, 1000);
        assert_eq!(u.progress, 25.0);
        assert_eq!(u.eta_secs, Some(6));
        assert_eq!((u.peers, u.seeds), (9, 4));
        assert_eq!(u.info_hash.as_deref(), Some("abcdef"));
        assert!(u.error.is_none());
    }

    #[test]
    fn unknown_eta_and_stopped() {
        let t = sample(json!({ "id": 1, "status": 0, "eta": -1, "metadataPercentComplete": 1.0, "sizeWhenDone": 10, "leftUntilDone": 10 }));
        let u = t.to_update();
        assert_eq!(u.status, TransferStatus::Paused);
        assert_eq!(u.eta_secs, None);
    }

    #[test]
    fn nothing_left_is_completed() {
        let t = sample(json!({ "id": 1, "status": 6, "percentDone": 1.0, "metadataPercentComplete": 1.0, "sizeWhenDone": 10, "leftUntilDone": 0 }));
        assert_eq!(t.status(), TransferStatus::Completed);
        assert_eq!(t.to_update().downloaded_bytes, 10);
    }

    #[test]
    fn metadata_pending_is_waiting_not_completed() {
        let t = sample(json!({ "id": 1, "status": 4, "metadataPercentComplete": 0.3, "sizeWhenDone": 0, "leftUntilDone": 0 }));
        assert!(!t.has_metadata());
        assert_eq!(t.status(), TransferStatus::Downloading);
        let checking = sample(json!({ "id": 1, "status": 2 }));
        assert_eq!(checking.status(), TransferStatus::Waiting);
    }

    #[test]
    fn local_error_is_failed_with_text() {
        let t = sample(json!({ "id": 1, "status": 0, "error": 3, "errorString": "No space left on device" }));
        let u = t.to_update();
        assert_eq!(u.status, TransferStatus::Failed);
        assert_eq!(u.error.as_deref(), Some("No space left on device"));
    }

    #[test]
    fn tracker_warning_is_not_failure() {
        let t = sample(json!({ "id": 1, "status": 4, "error": 1, "errorString": "tracker timeout", "metadataPercentComplete": 1.0, "sizeWhenDone": 10, "leftUntilDone": 5 }));
        let u = t.to_update();
        assert_eq!(u.status, TransferStatus::Downloading);
        assert_eq!(u.error.as_deref(), Some("tracker timeout"));
    }

    #[test]
    fn add_reply_accepts_duplicate() {
        let reply: AddReply = serde_json::from_value(json!({
            "torrent-duplicate": { "id": 3, "name": "x", "hashString": "ff" }
        }))
        .unwrap();
        let t = reply.into_torrent().unwrap();
        assert_eq!((t.id, t.hash_string.as_str()), (3, "ff"));

        let empty: AddReply = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(empty.into_torrent(), Err(EngineError::Rejected(_))));
    }

    #[test]
    fn non_success_result_is_rejection() {
        let reply: RpcReply =
            serde_json::from_value(json!({ "result": "invalid or corrupt torrent file" })).unwrap();
        assert_eq!(
            reply.into_arguments(),
            Err(EngineError::Rejected("invalid or corrupt torrent file".to_string()))
        );
    }
}
