use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the external transfer daemon (`[engine]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transmission-compatible JSON-RPC endpoint.
    pub rpc_url: String,
    /// Optional basic-auth user for the RPC endpoint.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional basic-auth password for the RPC endpoint.
    #[serde(default)]
    pub password: Option<String>,
    /// How often each transfer is sampled, in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-request timeout for RPC calls, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:9091/transmission/rpc".to_string(),
            username: None,
            password: None,
            poll_interval_ms: 2000,
            request_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Global configuration loaded from `~/.config/tdm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TdmConfig {
    /// Number of executors; also the maximum number of transfers supervised at once.
    pub workers: usize,
    /// Capacity of the admission queue. Jobs that do not fit stay queued in the DB.
    pub queue_capacity: usize,
    /// How long an engine may take to produce transfer metadata before the job fails.
    pub metadata_timeout_secs: u64,
    /// Interval of the global status log line.
    pub status_interval_secs: u64,
    /// Buffered progress samples per transfer between engine and monitor.
    pub update_buffer: usize,
    /// Where the engine stores payload data (None = engine default).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Where uploaded descriptor files are cached (None = XDG state dir).
    #[serde(default)]
    pub descriptor_dir: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for TdmConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue_capacity: 100,
            metadata_timeout_secs: 60,
            status_interval_secs: 3,
            update_buffer: 100,
            download_dir: None,
            descriptor_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

impl TdmConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    /// Descriptor cache directory, falling back to `~/.local/state/tdm/descriptors`.
    pub fn descriptor_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.descriptor_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tdm")?;
        Ok(xdg_dirs.get_state_home().join("tdm").join("descriptors"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Unix socket a running coordinator listens on (same XDG state dir as the DB).
pub fn control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tdm")?;
    Ok(xdg_dirs.get_state_home().join("tdm").join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: TdmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
