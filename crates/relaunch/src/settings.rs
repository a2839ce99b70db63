use std::path::Path;
use std::time::Duration;

use log::warn;
use relaunch_core::UpdateConfig;
use serde::{Deserialize, Serialize};

const MIN_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppSettings {
    #[serde(default = "default_true")]
    pub auto_check_updates: bool,

    #[serde(default)]
    pub auto_download: bool,

    #[serde(default = "default_true")]
    pub install_on_quit: bool,

    #[serde(default)]
    pub receive_prerelease_updates: bool,

    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_feed_repository")]
    pub feed_repository: String,
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    60 * 60
}

fn default_http_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_feed_repository() -> String {
    "relaunch-app/relaunch".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_check_updates: true,
            auto_download: false,
            install_on_quit: true,
            receive_prerelease_updates: false,
            check_interval_secs: default_check_interval(),
            http_timeout_secs: default_http_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            feed_repository: default_feed_repository(),
        }
    }
}

impl AppSettings {
    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!("Ignoring invalid settings file {}: {error}", path.display());
                Self::default()
            }),
            Err(error) => {
                warn!("Failed to read settings file {}: {error}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(MIN_CHECK_INTERVAL_SECS))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn update_config(&self) -> UpdateConfig {
        UpdateConfig {
            auto_download: self.auto_download,
            install_on_quit: self.install_on_quit,
            prerelease_opt_in: self.receive_prerelease_updates,
        }
    }
}
