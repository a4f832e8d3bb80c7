use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WS_URL: &str = "wss://chat-ws-go.jwzhd.com/ws";
pub const DEFAULT_PLATFORM: &str = "android";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root state directory (default: ~/.yhchat)
    pub settings_dir: PathBuf,
    /// Account whose realtime stream is consumed
    pub user_id: Option<String>,
    /// Bearer token; prefer `token_file` or `YHCHAT_TOKEN` over storing it here
    pub token: Option<String>,
    /// File holding the bearer token, re-read on every (re)connect
    pub token_file: Option<PathBuf>,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub ws_url: String,
    pub platform: String,
    /// Stable device id; a random one is generated per process when absent
    pub device_id: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
    /// Extra buffer of the event broadcast before slow subscribers lag
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite cache file, relative to `settings_dir` unless absolute
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_dir: default_settings_dir(),
            user_id: None,
            token: None,
            token_file: None,
            realtime: RealtimeConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            device_id: None,
            heartbeat_interval_secs: 30,
            reconnect_delay_secs: 5,
            connect_timeout_secs: 10,
            event_buffer: 100,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cache.db"),
        }
    }
}

fn default_settings_dir() -> PathBuf {
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home_dir.join(".yhchat")
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer.max(1)
    }
}

impl Config {
    /// Load configuration from file; a missing file yields the defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| default_settings_dir().join("config.toml"));

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = path.unwrap_or_else(|| self.settings_dir.join("config.toml"));

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    /// Effective location of the SQLite cache.
    pub fn db_path(&self) -> PathBuf {
        if self.storage.db_path.is_absolute() {
            self.storage.db_path.clone()
        } else {
            self.settings_dir.join(&self.storage.db_path)
        }
    }
}
