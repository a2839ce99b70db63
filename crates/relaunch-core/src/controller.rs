//! Update lifecycle state machine and polling driver.
//!
//! One [`UpdateController`] exists per running application. It owns the
//! lifecycle state and the optional polling schedule, talks to an
//! [`UpdateFeedClient`] and reports every transition to a
//! [`NotificationSink`]. Feed failures never escape a check: they are logged
//! and reported to the host as "no update" for that cycle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::mpsc;

use crate::channel::{EffectiveChannel, resolve_channel};
use crate::error::UpdateError;
use crate::feed::{DownloadProgress, DownloadedUpdate, FeedSettings, UpdateFeedClient};
use crate::notification::{NotificationSink, UpdateNotification};
use crate::schedule::PollingSchedule;
use crate::version::is_newer;

/// Terminates the host process after an install has been handed off.
pub type QuitHandle = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Checking,
    Available {
        version: String,
    },
    NoUpdate,
    Downloading {
        version: String,
        progress: Option<DownloadProgress>,
    },
    Ready {
        version: String,
    },
    Error {
        message: String,
    },
}

impl UpdateState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Available { .. } => "available",
            Self::NoUpdate => "none",
            Self::Downloading { .. } => "downloading",
            Self::Ready { .. } => "ready",
            Self::Error { .. } => "error",
        }
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// `checking -> checking` is allowed so an overlapping check (coalesced by
    /// the feed) still announces itself; `downloading -> downloading` carries
    /// progress updates.
    #[must_use]
    pub fn can_transition_to(&self, next: &UpdateState) -> bool {
        matches!(
            (self, next),
            (
                Self::Idle
                    | Self::Checking
                    | Self::Available { .. }
                    | Self::NoUpdate
                    | Self::Error { .. },
                Self::Checking
            ) | (
                Self::Checking,
                Self::Available { .. } | Self::NoUpdate | Self::Error { .. }
            ) | (Self::Available { .. }, Self::Downloading { .. })
                | (
                    Self::Downloading { .. },
                    Self::Downloading { .. } | Self::Ready { .. } | Self::Error { .. }
                )
        )
    }
}

/// Host preferences that shape feed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConfig {
    pub auto_download: bool,
    pub install_on_quit: bool,
    pub prerelease_opt_in: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            auto_download: false,
            install_on_quit: true,
            prerelease_opt_in: false,
        }
    }
}

/// State shared between the controller and its polling task.
struct Lifecycle {
    feed: Arc<dyn UpdateFeedClient>,
    sink: Arc<dyn NotificationSink>,
    state: Mutex<UpdateState>,
    config: Mutex<UpdateConfig>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Lifecycle {
    fn state(&self) -> UpdateState {
        lock(&self.state).clone()
    }

    /// Move to `next` and emit `notification` under the same lock.
    fn transition(
        &self,
        next: UpdateState,
        notification: UpdateNotification,
    ) -> Result<(), UpdateError> {
        let mut state = lock(&self.state);
        if !state.can_transition_to(&next) {
            return Err(UpdateError::InvalidTransition {
                from: state.name(),
                to: next.name(),
            });
        }
        *state = next;
        self.sink.emit(notification);
        Ok(())
    }

    fn apply_config(&self, config: UpdateConfig) -> Result<EffectiveChannel, UpdateError> {
        let current_version = self.feed.current_version();
        let channel = resolve_channel(&current_version, config.prerelease_opt_in);
        let settings = FeedSettings {
            channel,
            allow_prerelease: config.prerelease_opt_in,
            auto_download: config.auto_download,
            auto_install_on_quit: config.install_on_quit,
        };

        self.feed
            .configure(&settings)
            .map_err(UpdateError::Configuration)?;
        *lock(&self.config) = config;

        info!(
            "Prerelease updates {} (appVersion: {current_version}, channel: {channel})",
            if config.prerelease_opt_in {
                "enabled"
            } else {
                "disabled"
            }
        );
        Ok(channel)
    }

    async fn check_now(&self) {
        if let Err(error) = self.transition(UpdateState::Checking, UpdateNotification::checking()) {
            debug!("Skipping update check: {error}");
            return;
        }
        info!("Checking for updates...");

        let found = match self.feed.check_for_update().await {
            Ok(found) => found,
            Err(feed_error) => {
                error!("Error checking for updates: {feed_error}");
                self.finish_check(
                    UpdateState::Error {
                        message: feed_error.to_string(),
                    },
                    UpdateNotification::none(None),
                );
                return;
            }
        };

        let current_version = self.feed.current_version();

        match found {
            Some(found) if is_newer(&found.version, &current_version) => {
                info!("New version available: {}", found.version);
                let notification = UpdateNotification::available(&found);
                let next = UpdateState::Available {
                    version: found.version,
                };
                if !self.finish_check(next, notification) {
                    return;
                }

                let auto_download = lock(&self.config).auto_download;
                if auto_download {
                    info!("Downloading update...");
                    // Failures are already logged and reported by `download`.
                    let _ = self.download().await;
                }
            }
            found => {
                let latest = found.map(|result| result.version);
                match &latest {
                    Some(version) => info!(
                        "No updates available (current: {current_version}, latest: {version})"
                    ),
                    None => info!("No updates available (current: {current_version})"),
                }
                self.finish_check(
                    UpdateState::NoUpdate,
                    UpdateNotification::none(latest.as_deref()),
                );
            }
        }
    }

    /// Apply the outcome of a check. An overlapping check that already moved
    /// the lifecycle on (for example into a download) wins; this one is
    /// dropped quietly.
    fn finish_check(&self, next: UpdateState, notification: UpdateNotification) -> bool {
        match self.transition(next, notification) {
            Ok(()) => true,
            Err(error) => {
                debug!("Discarding stale update check result: {error}");
                false
            }
        }
    }

    async fn download(&self) -> Result<DownloadedUpdate, UpdateError> {
        let UpdateState::Available { version } = self.state() else {
            return Err(UpdateError::NoUpdateAvailable);
        };

        self.transition(
            UpdateState::Downloading {
                version: version.clone(),
                progress: None,
            },
            UpdateNotification::downloading(&version, None),
        )?;

        let (tx, mut rx) = mpsc::channel::<DownloadProgress>(32);
        let forward_progress = async {
            while let Some(progress) = rx.recv().await {
                info!("Download progress: {:.1}", progress.percent());
                let _ = self.transition(
                    UpdateState::Downloading {
                        version: version.clone(),
                        progress: Some(progress),
                    },
                    UpdateNotification::downloading(&version, Some(progress)),
                );
            }
        };
        let (result, ()) = tokio::join!(self.feed.download(tx), forward_progress);

        match result {
            Ok(downloaded) => {
                info!("Update downloaded: {version}");
                for file in &downloaded.files {
                    info!("{}", file.display());
                }
                self.transition(
                    UpdateState::Ready {
                        version: version.clone(),
                    },
                    UpdateNotification::ready(&version),
                )?;
                Ok(downloaded)
            }
            Err(feed_error) => {
                error!("Update download failed: {feed_error}");
                let message = format!("Update download failed: {feed_error}");
                self.transition(
                    UpdateState::Error {
                        message: message.clone(),
                    },
                    UpdateNotification::error(Some(&version), message),
                )?;
                Err(UpdateError::Download(feed_error))
            }
        }
    }
}

pub struct UpdateController {
    lifecycle: Arc<Lifecycle>,
    quit: QuitHandle,
    schedule: Option<PollingSchedule>,
}

impl UpdateController {
    pub fn new(
        feed: Arc<dyn UpdateFeedClient>,
        sink: Arc<dyn NotificationSink>,
        quit: QuitHandle,
    ) -> Self {
        Self {
            lifecycle: Arc::new(Lifecycle {
                feed,
                sink,
                state: Mutex::new(UpdateState::Idle),
                config: Mutex::new(UpdateConfig::default()),
            }),
            quit,
            schedule: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.lifecycle.state()
    }

    #[must_use]
    pub fn config(&self) -> UpdateConfig {
        *lock(&self.lifecycle.config)
    }

    /// Apply download/install policy and the prerelease opt-in to the feed.
    /// Does not start a check.
    ///
    /// # Errors
    /// Returns [`UpdateError::Configuration`] when the feed rejects the
    /// settings; the previous configuration stays in effect.
    pub fn configure(&self, config: UpdateConfig) -> Result<EffectiveChannel, UpdateError> {
        info!(
            "Configuring updates; autoDownload: {}; installOnQuit: {}",
            config.auto_download, config.install_on_quit
        );
        self.lifecycle.apply_config(config)
    }

    /// Re-resolve the channel for a changed opt-in and optionally check
    /// right away.
    ///
    /// # Errors
    /// Returns [`UpdateError::Configuration`] when the feed rejects the new
    /// channel. No check is started in that case.
    pub async fn set_prerelease_opt_in(
        &self,
        enabled: bool,
        check_immediately: bool,
    ) -> Result<EffectiveChannel, UpdateError> {
        let config = UpdateConfig {
            prerelease_opt_in: enabled,
            ..self.config()
        };
        let channel = self.lifecycle.apply_config(config)?;

        if check_immediately {
            self.check_now().await;
        }
        Ok(channel)
    }

    /// Run one check cycle. Never fails: feed errors are logged and reported
    /// as "no update".
    pub async fn check_now(&self) {
        self.lifecycle.check_now().await;
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(PollingSchedule::is_active)
    }

    /// Check immediately, then keep checking every `interval`. Intervals
    /// below [`MIN_POLL_INTERVAL`](crate::schedule::MIN_POLL_INTERVAL) are
    /// raised to it. Does nothing when a schedule is already active.
    pub async fn start_polling(&mut self, interval: Duration) {
        if self.is_polling() {
            debug!("Auto update checks already running");
            return;
        }

        info!("Starting auto update check");
        self.lifecycle.check_now().await;

        let lifecycle = Arc::clone(&self.lifecycle);
        self.schedule = Some(PollingSchedule::arm(interval, move || {
            let lifecycle = Arc::clone(&lifecycle);
            async move { lifecycle.check_now().await }
        }));
    }

    /// Cancel future scheduled checks. A download already running is not
    /// interrupted.
    pub fn stop_polling(&mut self) {
        match self.schedule.take() {
            Some(schedule) if schedule.is_active() => {
                schedule.cancel();
                info!("Stopped auto update checks");
            }
            _ => debug!("Auto update checks are not running"),
        }
    }

    /// Follow the "check for updates automatically" preference.
    pub async fn set_auto_check_updates(&mut self, enabled: bool, interval: Duration) {
        if enabled {
            self.start_polling(interval).await;
        } else {
            self.stop_polling();
        }
    }

    /// Download the update announced by the last check.
    ///
    /// # Errors
    /// Returns [`UpdateError::NoUpdateAvailable`] when no update is currently
    /// available, and [`UpdateError::Download`] when the feed fails; in the
    /// latter case the lifecycle moves to `error` and is not retried.
    pub async fn download_and_install(&self) -> Result<DownloadedUpdate, UpdateError> {
        self.lifecycle.download().await
    }

    /// Install the downloaded update and terminate the host.
    ///
    /// # Errors
    /// Returns [`UpdateError::NotReady`] when nothing has been downloaded and
    /// [`UpdateError::Install`] when the feed cannot start the installer.
    pub fn install_and_relaunch(&self) -> Result<(), UpdateError> {
        if !matches!(self.state(), UpdateState::Ready { .. }) {
            return Err(UpdateError::NotReady);
        }

        info!("Installing update and restarting app");
        self.lifecycle
            .feed
            .install_and_quit(true)
            .map_err(UpdateError::Install)?;
        (self.quit)();
        Ok(())
    }

    /// Tear down the polling schedule.
    pub fn shutdown(&mut self) {
        self.stop_polling();
    }
}

impl Drop for UpdateController {
    fn drop(&mut self) {
        if let Some(schedule) = self.schedule.take() {
            schedule.cancel();
        }
    }
}
