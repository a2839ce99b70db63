//! GitHub Releases transport for Relaunch updates.
//!
//! Implements [`relaunch_core::UpdateFeedClient`] on top of the GitHub REST
//! releases listing: channel-aware release selection, single-flight update
//! checks, streamed asset downloads and installer hand-off.

mod download;
mod feed;
mod release;
mod single_flight;

pub use feed::GitHubReleasesFeed;
pub use release::{GitHubAsset, GitHubRelease, asset_name, select_release};
