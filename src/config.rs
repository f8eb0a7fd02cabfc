use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "feed_config.json";
const DATA_DIR_ENV: &str = "CRM_FEED_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeedConfig {
    pub poll_interval_secs: u64,
    pub probe_timeout_secs: u64,
    /// Whether credentials survive a restart. Seeds the stored flag on first run.
    pub remember_me: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            probe_timeout_secs: 5,
            remember_me: true,
        }
    }
}

impl FeedConfig {
    pub fn load(app_data: &Path) -> Self {
        let config_path = app_data.join(CONFIG_FILE);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                    Self::default()
                }),
                Err(_) => Self::default(),
            }
        } else {
            let c = Self::default();
            c.save(app_data);
            c
        }
    }

    pub fn save(&self, app_data: &Path) {
        let config_path = app_data.join(CONFIG_FILE);
        if let Ok(content) = serde_json::to_string_pretty(self) {
            std::fs::write(config_path, content).ok();
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// `$CRM_FEED_DATA_DIR`, else `<platform data dir>/crm-activity-feed`.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crm-activity-feed")
}
