use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;

use relaunch_core::{ComparableVersion, FeedSettings, UpdateCheckResult, parse_strict_version};

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

impl GitHubRelease {
    #[must_use]
    pub fn version(&self) -> &str {
        self.tag_name.strip_prefix('v').unwrap_or(&self.tag_name)
    }

    #[must_use]
    pub fn platform_asset(&self) -> Option<&GitHubAsset> {
        let expected = asset_name(self.version())?;
        self.assets.iter().find(|asset| asset.name == expected)
    }

    #[must_use]
    pub fn to_check_result(&self) -> UpdateCheckResult {
        UpdateCheckResult {
            version: self.version().to_string(),
            release_date: self.published_at,
            release_notes: self.body.clone(),
        }
    }
}

#[must_use]
pub fn asset_name(version: &str) -> Option<String> {
    let name = if cfg!(target_os = "macos") && cfg!(target_arch = "aarch64") {
        format!("relaunch-{version}-macos-arm64.dmg")
    } else if cfg!(target_os = "macos") && cfg!(target_arch = "x86_64") {
        format!("relaunch-{version}-macos-x64.dmg")
    } else if cfg!(target_os = "linux") && cfg!(target_arch = "x86_64") {
        format!("relaunch-{version}-linux-x64.AppImage")
    } else if cfg!(target_os = "linux") && cfg!(target_arch = "aarch64") {
        format!("relaunch-{version}-linux-arm64.AppImage")
    } else if cfg!(target_os = "windows") && cfg!(target_arch = "x86_64") {
        format!("relaunch-{version}-windows-x64.exe")
    } else {
        return None;
    };
    Some(name)
}

/// Whether a published version belongs to the configured track.
///
/// Stable releases are always eligible. A prerelease is eligible only when
/// prereleases are allowed and its first identifier names the configured
/// channel.
fn on_channel(version: &ComparableVersion, settings: &FeedSettings) -> bool {
    if !version.is_prerelease() {
        return true;
    }
    if !settings.allow_prerelease {
        return false;
    }
    settings
        .channel
        .prerelease()
        .is_some_and(|channel| version.prerelease_channel() == Some(channel))
}

/// Pick the highest published release on the configured channel.
///
/// Tags must be semantic versions; anything else (nightlies, dated builds)
/// is skipped rather than coerced.
#[must_use]
pub fn select_release<'a>(
    releases: &'a [GitHubRelease],
    settings: &FeedSettings,
) -> Option<&'a GitHubRelease> {
    releases
        .iter()
        .filter(|release| !release.draft)
        .filter_map(|release| match parse_strict_version(release.version()) {
            Ok(version) => Some((version, release)),
            Err(error) => {
                debug!("Skipping release {}: {error}", release.tag_name);
                None
            }
        })
        .filter(|(version, _)| on_channel(version, settings))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, release)| release)
}
