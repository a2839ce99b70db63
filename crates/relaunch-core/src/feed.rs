use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::channel::EffectiveChannel;
use crate::error::FeedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    pub channel: EffectiveChannel,
    pub allow_prerelease: bool,
    pub auto_download: bool,
    pub auto_install_on_quit: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            channel: EffectiveChannel::Latest,
            allow_prerelease: false,
            auto_download: false,
            auto_install_on_quit: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    pub version: String,
    pub release_date: Option<DateTime<Utc>>,
    pub release_notes: Option<String>,
}

impl UpdateCheckResult {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            release_date: None,
            release_notes: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub transferred: u64,
    pub total: u64,
}

impl DownloadProgress {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.transferred as f64 / self.total as f64 * 100.0).min(100.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedUpdate {
    pub version: String,
    pub files: Vec<PathBuf>,
}

/// Transport for update discovery, download and install.
///
/// Implementations must be single-flight for `check_for_update`: concurrent
/// calls are coalesced into one request and all callers observe its result.
/// The controller relies on this and does not serialize checks itself.
/// Timeouts are also the implementation's concern.
#[async_trait]
pub trait UpdateFeedClient: Send + Sync {
    /// Apply channel and download/install policy.
    ///
    /// # Errors
    /// Returns [`FeedError::InvalidConfiguration`] when the combination is not
    /// supported; previous settings stay in effect.
    fn configure(&self, settings: &FeedSettings) -> Result<(), FeedError>;

    async fn check_for_update(&self) -> Result<Option<UpdateCheckResult>, FeedError>;

    /// Download the update found by the last successful check, reporting
    /// progress on `progress`.
    async fn download(
        &self,
        progress: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadedUpdate, FeedError>;

    /// Hand the downloaded update to the platform installer. The caller is
    /// expected to terminate the process afterwards.
    fn install_and_quit(&self, run_after_install: bool) -> Result<(), FeedError>;

    fn current_version(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::DownloadProgress;

    #[test]
    fn percent_handles_unknown_total() {
        let progress = DownloadProgress {
            transferred: 512,
            total: 0,
        };
        assert!(progress.percent().abs() < f64::EPSILON);
    }

    #[test]
    fn percent_is_capped_at_one_hundred() {
        let progress = DownloadProgress {
            transferred: 150,
            total: 100,
        };
        assert!((progress.percent() - 100.0).abs() < f64::EPSILON);
    }
}
