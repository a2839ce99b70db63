use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChannelParseError;
use crate::version::normalize;

/// Prerelease tracks a build can belong to, named by its first prerelease
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrereleaseChannel {
    Alpha,
    Beta,
    Rc,
}

impl PrereleaseChannel {
    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "rc" => Some(Self::Rc),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }
}

/// The channel the update feed is queried with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectiveChannel {
    Alpha,
    Beta,
    Rc,
    #[default]
    Latest,
}

impl EffectiveChannel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
            Self::Latest => "latest",
        }
    }

    #[must_use]
    pub fn prerelease(self) -> Option<PrereleaseChannel> {
        match self {
            Self::Alpha => Some(PrereleaseChannel::Alpha),
            Self::Beta => Some(PrereleaseChannel::Beta),
            Self::Rc => Some(PrereleaseChannel::Rc),
            Self::Latest => None,
        }
    }
}

impl From<PrereleaseChannel> for EffectiveChannel {
    fn from(channel: PrereleaseChannel) -> Self {
        match channel {
            PrereleaseChannel::Alpha => Self::Alpha,
            PrereleaseChannel::Beta => Self::Beta,
            PrereleaseChannel::Rc => Self::Rc,
        }
    }
}

impl fmt::Display for EffectiveChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectiveChannel {
    type Err = ChannelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "rc" => Ok(Self::Rc),
            "latest" => Ok(Self::Latest),
            _ => Err(ChannelParseError {
                value: s.to_string(),
            }),
        }
    }
}

/// Pick the channel to compare against.
///
/// Without the prerelease opt-in this is always `latest`. With it, a build
/// already on a prerelease track stays on that track; a stable build enters
/// the prerelease track through `beta`.
#[must_use]
pub fn resolve_channel(current_version: &str, prerelease_opt_in: bool) -> EffectiveChannel {
    if !prerelease_opt_in {
        return EffectiveChannel::Latest;
    }

    normalize(current_version)
        .ok()
        .and_then(|version| version.prerelease_channel())
        .map_or(EffectiveChannel::Beta, EffectiveChannel::from)
}
