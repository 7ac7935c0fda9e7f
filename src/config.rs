use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory inventory (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "crate::util::get_db_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: crate::util::get_db_path(),
        }
    }
}

/// How a ping result is combined with the port/HTTP check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PingPolicy {
    /// Do not ping, the service check alone decides
    #[default]
    Disabled,

    /// Online only if the host answers ping and the service check succeeds
    RequireBoth,

    /// A ping reply is enough for online, even if the service check fails
    HostReachable,
}

/// Settings of the background poller and of on-demand probes
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Seconds between two poll cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Per-attempt network timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Upper bound for probes running at the same time
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    #[serde(default)]
    pub ping: PingPolicy,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            timeout: default_timeout(),
            max_concurrent_probes: default_max_concurrent_probes(),
            ping: PingPolicy::default(),
        }
    }
}

/// REST API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    #[serde(default = "crate::util::get_api_addr")]
    pub bind: SocketAddr,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind: crate::util::get_api_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub api: ApiSettings,
}

fn default_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    3
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_api_enabled() -> bool {
    true
}

fn default_enable_cors() -> bool {
    true
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
