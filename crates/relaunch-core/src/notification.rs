use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::feed::{DownloadProgress, UpdateCheckResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Checking,
    Available,
    Downloading,
    Ready,
    None,
    Error,
}

/// Payload handed to the host on every lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotification {
    pub available: bool,
    pub downloaded: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl UpdateNotification {
    #[must_use]
    pub fn checking() -> Self {
        Self {
            available: false,
            downloaded: false,
            kind: NotificationKind::Checking,
            version: None,
            message: "Checking for updates...".to_string(),
            release_date: None,
            release_notes: None,
        }
    }

    /// Announces `found`, carrying its release date and notes for display.
    #[must_use]
    pub fn available(found: &UpdateCheckResult) -> Self {
        Self {
            available: true,
            downloaded: false,
            kind: NotificationKind::Available,
            version: Some(found.version.clone()),
            message: format!("New version available: {}", found.version),
            release_date: found.release_date,
            release_notes: found.release_notes.clone(),
        }
    }

    #[must_use]
    pub fn none(latest: Option<&str>) -> Self {
        Self {
            available: false,
            downloaded: false,
            kind: NotificationKind::None,
            version: latest.map(str::to_string),
            message: "No updates available".to_string(),
            release_date: None,
            release_notes: None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn downloading(version: &str, progress: Option<DownloadProgress>) -> Self {
        let percent = progress.map_or(0, |p| p.percent().round() as u32);
        Self {
            available: true,
            downloaded: false,
            kind: NotificationKind::Downloading,
            version: Some(version.to_string()),
            message: format!("Downloading update: {percent}%"),
            release_date: None,
            release_notes: None,
        }
    }

    #[must_use]
    pub fn ready(version: &str) -> Self {
        Self {
            available: true,
            downloaded: true,
            kind: NotificationKind::Ready,
            version: Some(version.to_string()),
            message: "Update downloaded, restart to install.".to_string(),
            release_date: None,
            release_notes: None,
        }
    }

    #[must_use]
    pub fn error(version: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            available: false,
            downloaded: false,
            kind: NotificationKind::Error,
            version: version.map(str::to_string),
            message: message.into(),
            release_date: None,
            release_notes: None,
        }
    }
}

/// Receives lifecycle notifications.
///
/// `emit` runs while the controller holds its state lock, so a sink must not
/// call back into the controller synchronously.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: UpdateNotification);
}

impl<F> NotificationSink for F
where
    F: Fn(UpdateNotification) + Send + Sync,
{
    fn emit(&self, notification: UpdateNotification) {
        self(notification);
    }
}

impl NotificationSink for mpsc::UnboundedSender<UpdateNotification> {
    fn emit(&self, notification: UpdateNotification) {
        // A closed receiver means the host stopped listening.
        let _ = self.send(notification);
    }
}
