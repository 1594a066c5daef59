//! Blocking JSON-RPC transport to the Transmission daemon.
//!
//! Uses the curl crate (libcurl). Every call runs on the blocking pool via
//! `spawn_blocking`. The daemon's CSRF handshake is handled transparently:
//! a 409 reply carries a fresh `X-Transmission-Session-Id`, which is stored
//! and the request retried once.

use super::types::{LoadedRow, RpcReply, TorrentFields, TorrentList, TORRENT_FIELDS};
use crate::config::EngineConfig;
use crate::engine::{EngineError, LoadedTransfer};
use curl::easy::{Easy, List};
use serde_json::{json, Value};
use std::str;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SESSION_HEADER: &str = "x-transmission-session-id";

#[derive(Debug, Clone)]
pub(super) struct RpcClient {
    url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    session_id: Arc<Mutex<Option<String>>>,
}

fn curl_err(e: curl::Error) -> EngineError {
    EngineError::Unavailable(e.to_string())
}

/// Extracts the session id from raw response header lines.
pub(super) fn session_id_from_headers(headers: &[String]) -> Option<String> {
    headers.iter().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(SESSION_HEADER) {
            let v = value.trim();
            (!v.is_empty()).then(|| v.to_string())
        } else {
            None
        }
    })
}

struct RawResponse {
    code: u32,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl RpcClient {
    pub(super) fn new(cfg: &EngineConfig) -> Self {
        Self {
            url: cfg.rpc_url.clone(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            timeout: cfg.request_timeout(),
            session_id: Arc::new(Mutex::new(None)),
        }
    }

    /// Invoke `method` with `arguments`; returns the reply's `arguments` object.
    pub(super) async fn call(&self, method: &str, arguments: Value) -> Result<Value, EngineError> {
        let body = serde_json::to_vec(&json!({ "method": method, "arguments": arguments }))
            .map_err(|e| EngineError::Rejected(format!("encode {} request: {}", method, e)))?;
        let client = self.clone();
        let method_name = method.to_string();
        tokio::task::spawn_blocking(move || client.call_blocking(&method_name, &body))
            .await
            .map_err(|e| EngineError::Unavailable(format!("rpc task failed: {}", e)))?
    }

    fn call_blocking(&self, method: &str, body: &[u8]) -> Result<Value, EngineError> {
        for _ in 0..2 {
            let resp = self.post(body)?;
            match resp.code {
                409 => {
                    let id = session_id_from_headers(&resp.headers).ok_or_else(|| {
                        EngineError::Unavailable("409 without session id".to_string())
                    })?;
                    tracing::debug!("transmission session id refreshed");
                    *self.session_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
                    continue;
                }
                401 | 403 => {
                    return Err(EngineError::Unavailable(format!(
                        "rpc {} refused credentials (HTTP {})",
                        method, resp.code
                    )))
                }
                code if !(200..300).contains(&code) => {
                    return Err(EngineError::Unavailable(format!(
                        "rpc {} returned HTTP {}",
                        method, code
                    )))
                }
                _ => {}
            }
            let reply: RpcReply = serde_json::from_slice(&resp.body).map_err(|e| {
                EngineError::Unavailable(format!("rpc {} reply is not valid JSON: {}", method, e))
            })?;
            return reply.into_arguments();
        }
        Err(EngineError::Unavailable(
            "session handshake did not settle".to_string(),
        ))
    }

    fn post(&self, body: &[u8]) -> Result<RawResponse, EngineError> {
        let mut headers: Vec<String> = Vec::new();
        let mut data: Vec<u8> = Vec::new();

        let mut easy = Easy::new();
        easy.url(&self.url).map_err(curl_err)?;
        easy.post(true).map_err(curl_err)?;
        easy.post_fields_copy(body).map_err(curl_err)?;
        easy.connect_timeout(Duration::from_secs(10)).map_err(curl_err)?;
        easy.timeout(self.timeout).map_err(curl_err)?;

        let mut list = List::new();
        list.append("Content-Type: application/json").map_err(curl_err)?;
        let session = self
            .session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(id) = session {
            list.append(&format!("X-Transmission-Session-Id: {}", id))
                .map_err(curl_err)?;
        }
        easy.http_headers(list).map_err(curl_err)?;

        if let Some(user) = &self.username {
            easy.username(user).map_err(curl_err)?;
            easy.password(self.password.as_deref().unwrap_or(""))
                .map_err(curl_err)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|h| {
                    if let Ok(s) = str::from_utf8(h) {
                        headers.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer
                .write_function(|chunk| {
                    data.extend_from_slice(chunk);
                    Ok(chunk.len())
                })
                .map_err(curl_err)?;
            transfer.perform().map_err(curl_err)?;
        }

        let code = easy.response_code().map_err(curl_err)?;
        Ok(RawResponse {
            code,
            headers,
            body: data,
        })
    }

    /// Full sample of one torrent, or None if the daemon no longer holds it.
    pub(super) async fn torrent(&self, id: i64) -> Result<Option<TorrentFields>, EngineError> {
        let args = self
            .call(
                "torrent-get",
                json!({ "ids": [id], "fields": TORRENT_FIELDS }),
            )
            .await?;
        let list: TorrentList<TorrentFields> = serde_json::from_value(args)
            .map_err(|e| EngineError::Unavailable(format!("torrent-get reply: {}", e)))?;
        Ok(list.torrents.into_iter().find(|t| t.id == id))
    }

    pub(super) async fn loaded(&self) -> Result<Vec<LoadedTransfer>, EngineError> {
        let args = self
            .call("torrent-get", json!({ "fields": ["id", "hashString"] }))
            .await?;
        let list: TorrentList<LoadedRow> = serde_json::from_value(args)
            .map_err(|e| EngineError::Unavailable(format!("torrent-get reply: {}", e)))?;
        Ok(list
            .torrents
            .into_iter()
            .map(|row| LoadedTransfer {
                transfer_id: row.id.to_string(),
                info_hash: row.hash_string,
            })
            .collect())
    }

    /// Run an action method (`torrent-stop`, `torrent-start`, ...) on one torrent.
    pub(super) async fn act(&self, method: &str, id: i64, extra: Option<(&str, Value)>) -> Result<(), EngineError> {
        let mut args = json!({ "ids": [id] });
        if let Some((key, value)) = extra {
            args[key] = value;
        }
        self.call(method, args).await.map(|_| ())
    }
}
