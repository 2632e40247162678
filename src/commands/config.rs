use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::game::reconcile::ControllerConfig;
use crate::util::data_dir;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub version: u32,
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_move_cooldown_ms")]
    pub move_cooldown_ms: u64,
    #[serde(default = "default_repeat_cooldown_ms")]
    pub repeat_cooldown_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_sweep_every")]
    pub sweep_every: u32,
    #[serde(default = "default_session_log")]
    pub session_log: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_move_cooldown_ms() -> u64 {
    120
}

fn default_repeat_cooldown_ms() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_sweep_every() -> u32 {
    10
}

fn default_session_log() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server_url: default_server_url(),
            move_cooldown_ms: default_move_cooldown_ms(),
            repeat_cooldown_ms: default_repeat_cooldown_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_every: default_sweep_every(),
            session_log: default_session_log(),
        }
    }
}

impl ClientConfig {
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            move_cooldown: Duration::from_millis(self.move_cooldown_ms),
            repeat_cooldown: Duration::from_millis(self.repeat_cooldown_ms),
            sweep_every: self.sweep_every,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin.
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

pub fn config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("config.json"))
}

pub fn load_config_from(path: &Path) -> Option<ClientConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Config from `~/.bobavim/config.json`, or defaults when missing or unreadable.
pub fn load_config() -> ClientConfig {
    config_path()
        .and_then(|p| load_config_from(&p))
        .unwrap_or_default()
}

pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn save_config(config: &ClientConfig) -> Result<PathBuf> {
    let path =
        config_path().ok_or_else(|| ClientError::Custom("Cannot find home directory".into()))?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Upsert the server URL into the stored config.
pub fn save_server_url(url: &str) -> Result<ClientConfig> {
    let mut config = load_config();
    config.server_url = crate::util::normalize_base_url(url);
    save_config(&config)?;
    Ok(config)
}
