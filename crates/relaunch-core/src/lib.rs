//! Update discovery and lifecycle core for Relaunch.
//!
//! This crate holds the decision logic of self-updating, independent of any
//! concrete update transport:
//! - Version normalization and precedence ordering.
//! - Release channel resolution from the prerelease opt-in.
//! - The update lifecycle state machine, its polling schedule and the
//!   notifications it emits.
//! - The collaborator trait a feed transport implements.

pub mod channel;
pub mod controller;
mod error;
pub mod feed;
pub mod notification;
pub mod schedule;
pub mod version;

/// Channel enums and the channel resolver.
pub use channel::{EffectiveChannel, PrereleaseChannel, resolve_channel};
/// Lifecycle controller, its state and host-supplied configuration.
pub use controller::{QuitHandle, UpdateConfig, UpdateController, UpdateState};
/// Error types for versions, channels, feeds and the controller.
pub use error::{ChannelParseError, FeedError, NetworkStage, UpdateError, VersionError};
/// Update feed collaborator boundary.
pub use feed::{DownloadProgress, DownloadedUpdate, FeedSettings, UpdateCheckResult, UpdateFeedClient};
/// Host-facing notification payload and sinks.
pub use notification::{NotificationKind, NotificationSink, UpdateNotification};
/// Polling schedule and its default interval.
pub use schedule::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, PollingSchedule};
/// Version comparison helpers.
pub use version::{
    ComparableVersion, compare, extract_prerelease_channel, is_newer, normalize, parse_strict_version,
};
