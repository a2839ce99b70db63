//! Version normalization and precedence ordering.
//!
//! Inputs are raw build identifiers as reported by the running app or the
//! update feed. They are parsed strictly as semantic versions first; only
//! when that fails is the leading `major[.minor[.patch]]` run coerced into a
//! version, dropping anything else.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;
use semver::Version;

use crate::channel::PrereleaseChannel;
use crate::error::VersionError;

static COERCE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok());

/// A version that parsed (strictly or by coercion) and can be ordered.
///
/// Equality and ordering follow semver precedence: build metadata is kept for
/// display but never takes part in a comparison.
#[derive(Debug, Clone)]
pub struct ComparableVersion(Version);

impl ComparableVersion {
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    #[must_use]
    pub fn prerelease_channel(&self) -> Option<PrereleaseChannel> {
        extract_prerelease_channel(self)
    }
}

impl PartialEq for ComparableVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ComparableVersion {}

impl PartialOrd for ComparableVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComparableVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.0, &other.0);
        a.major
            .cmp(&b.major)
            .then(a.minor.cmp(&b.minor))
            .then(a.patch.cmp(&b.patch))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl fmt::Display for ComparableVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComparableVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Normalize a raw version string.
///
/// # Errors
/// Returns [`VersionError::NotComparable`] when the input is neither a valid
/// semantic version nor contains a numeric run that can be coerced into one.
pub fn normalize(raw: &str) -> Result<ComparableVersion, VersionError> {
    parse_strict(raw)
        .or_else(|| coerce(raw))
        .map(ComparableVersion)
        .ok_or_else(|| VersionError::NotComparable {
            raw: raw.to_string(),
        })
}

/// Parse a published version strictly, without the lenient fallback.
///
/// Release listings use this so a tag such as `nightly-2024-06-01` is never
/// mistaken for version `2024.0.0`.
///
/// # Errors
/// Returns [`VersionError::NotComparable`] when the input is not a valid
/// semantic version (an optional leading `v` is accepted).
pub fn parse_strict_version(raw: &str) -> Result<ComparableVersion, VersionError> {
    parse_strict(raw)
        .map(ComparableVersion)
        .ok_or_else(|| VersionError::NotComparable {
            raw: raw.to_string(),
        })
}

#[must_use]
pub fn compare(a: &ComparableVersion, b: &ComparableVersion) -> Ordering {
    a.cmp(b)
}

/// Whether `candidate` is strictly newer than `current`.
///
/// A side that cannot be normalized is never reported as newer; the
/// condition is logged rather than returned.
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (normalize(candidate), normalize(current)) {
        (Ok(candidate), Ok(current)) => candidate > current,
        _ => {
            warn!("Unable to compare versions. candidate=\"{candidate}\", current=\"{current}\"");
            false
        }
    }
}

/// The recognized channel named by the first prerelease identifier, if any.
#[must_use]
pub fn extract_prerelease_channel(version: &ComparableVersion) -> Option<PrereleaseChannel> {
    version
        .0
        .pre
        .as_str()
        .split('.')
        .next()
        .and_then(PrereleaseChannel::from_identifier)
}

fn parse_strict(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

fn coerce(raw: &str) -> Option<Version> {
    let captures = COERCE_PATTERN.as_ref()?.captures(raw)?;
    let component = |index: usize| -> Option<u64> {
        captures
            .get(index)
            .map_or(Some(0), |m| m.as_str().parse::<u64>().ok())
    };

    Some(Version::new(component(1)?, component(2)?, component(3)?))
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    const SAMPLES: &[&str] = &[
        "0.1.0",
        "1.0.0-alpha",
        "1.0.0-alpha.1",
        "1.0.0-beta.2",
        "1.0.0-beta.10",
        "1.0.0-rc.1",
        "1.0.0",
        "1.9.0-beta.5",
        "1.9.0-rc.1",
        "1.9.0-rc.2",
        "1.9.0+build.7",
        "2.0.0",
    ];

    fn version(raw: &str) -> ComparableVersion {
        normalize(raw).expect("sample version should normalize")
    }

    #[test]
    fn test_version_comparison() {
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(is_newer("1.1.0", "1.0.0"));
        assert!(is_newer("2.0.0", "1.9.9"));
        assert!(is_newer("1.2", "1.1.9"));
        assert!(is_newer("1", "0.99.0"));
        assert!(is_newer("1.0.0", "1.0.0-beta.2"));
        assert!(is_newer("v1.0.1", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.2", "1.2.0"));
        assert!(!is_newer("1.0.0-beta.2", "1.0.0-beta.10"));
        assert!(!is_newer("1.0.0", "1.0.1"));
        assert!(!is_newer("0.9.0", "1.0.0"));
    }

    #[test]
    fn rc_identifiers_compare_numerically() {
        assert!(is_newer("1.9.0-rc.2", "1.9.0-rc.1"));
        assert!(!is_newer("1.9.0-rc.1", "1.9.0-rc.2"));
    }

    #[test]
    fn lower_channel_prerelease_is_not_newer() {
        assert!(!is_newer("1.9.0-beta.5", "1.9.0-rc.1"));
        assert!(is_newer("1.9.0-rc.1", "1.9.0-beta.5"));
    }

    #[test]
    fn equal_versions_are_not_newer() {
        assert!(!is_newer("1.9.0", "1.9.0"));
        assert!(!is_newer("1.9.0-rc.1", "v1.9.0-rc.1"));
    }

    #[test]
    fn build_metadata_is_ignored() {
        assert_eq!(
            compare(&version("1.9.0+build.7"), &version("1.9.0+build.8")),
            Ordering::Equal
        );
        assert!(!is_newer("1.9.0+build.9", "1.9.0"));
        assert_eq!(version("1.9.0+build.7").to_string(), "1.9.0+build.7");
    }

    #[test]
    fn strict_parse_keeps_prerelease() {
        let parsed = version("v1.9.0-rc.1");
        assert_eq!(parsed.to_string(), "1.9.0-rc.1");
        assert!(parsed.is_prerelease());
    }

    #[test]
    fn lenient_coercion_fills_missing_components() {
        assert_eq!(version("2").to_string(), "2.0.0");
        assert_eq!(version("v2.3").to_string(), "2.3.0");
        assert_eq!(version("release-4.5.6-final").to_string(), "4.5.6");
        assert_eq!(version("1.2.3.4").to_string(), "1.2.3");
    }

    #[test]
    fn lenient_coercion_drops_unparseable_prerelease() {
        let coerced = version("1.9.0-rc.1+build..broken");
        assert_eq!(coerced.to_string(), "1.9.0");
        assert!(!coerced.is_prerelease());
        assert_eq!(coerced.prerelease_channel(), None);
    }

    #[test]
    fn unparseable_versions_are_not_comparable() {
        assert_eq!(
            normalize("nightly"),
            Err(VersionError::NotComparable {
                raw: "nightly".to_string()
            })
        );
        assert!(normalize("").is_err());
        assert!(normalize("99999999999999999999999.0.0").is_err());
    }

    #[test]
    fn strict_parse_rejects_what_only_coercion_accepts() {
        assert_eq!(
            parse_strict_version("v1.10.0-rc.1").expect("semver tag should parse"),
            version("1.10.0-rc.1")
        );
        assert_eq!(version("nightly-2024-06-01").to_string(), "2024.0.0");
        assert!(matches!(
            parse_strict_version("nightly-2024-06-01"),
            Err(VersionError::NotComparable { .. })
        ));
        assert!(parse_strict_version("1.9").is_err());
    }

    #[test]
    fn not_comparable_is_never_newer() {
        for sample in SAMPLES {
            assert!(!is_newer("nightly", sample));
            assert!(!is_newer(sample, "unknown-build"));
        }
        assert!(!is_newer("", ""));
    }

    #[test]
    fn normalization_is_idempotent() {
        for sample in SAMPLES.iter().chain(["v3.1", "build 7.2.1 (x64)"].iter()) {
            let once = version(sample);
            let twice = version(&once.to_string());
            assert_eq!(once, twice, "normalizing {sample} twice should be stable");
            assert_eq!(once.to_string(), twice.to_string());
        }
    }

    #[test]
    fn comparison_is_antisymmetric() {
        for a in SAMPLES {
            let a = version(a);
            assert_eq!(compare(&a, &a), Ordering::Equal);
            for b in SAMPLES {
                let b = version(b);
                assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
            }
        }
    }

    #[test]
    fn extracts_recognized_prerelease_channels_only() {
        assert_eq!(
            version("1.9.0-alpha.3").prerelease_channel(),
            Some(PrereleaseChannel::Alpha)
        );
        assert_eq!(
            version("1.9.0-beta").prerelease_channel(),
            Some(PrereleaseChannel::Beta)
        );
        assert_eq!(
            version("1.9.0-rc.1").prerelease_channel(),
            Some(PrereleaseChannel::Rc)
        );
        assert_eq!(version("1.9.0-nightly.1").prerelease_channel(), None);
        assert_eq!(version("1.9.0-1.beta").prerelease_channel(), None);
        assert_eq!(version("1.9.0").prerelease_channel(), None);
    }
}
