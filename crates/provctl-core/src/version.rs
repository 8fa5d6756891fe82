//! Semver helpers for provider versions
//!
//! Provider versions are published as `v1.2.3` tags; the leading `v` is optional.

use semver::Version;

use crate::error::{CoreError, Result};

/// Parse a provider version, accepting an optional leading `v`
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|e| CoreError::InvalidVersion {
        version: raw.to_string(),
        message: e.to_string(),
    })
}

/// Pick the highest version from a list of raw version strings.
///
/// Unparseable entries are ignored. Pre-releases are skipped unless
/// `include_prerelease` is set.
pub fn latest_version<'a, I>(versions: I, include_prerelease: bool) -> Option<(&'a str, Version)>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(|raw| parse_version(raw).ok().map(|v| (raw, v)))
        .filter(|(_, v)| include_prerelease || v.pre.is_empty())
        .max_by(|(_, a), (_, b)| a.cmp(b))
}

/// Whether `candidate` is strictly newer than `current`; unparseable input is never newer
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_version(candidate), parse_version(current)) {
        (Ok(c), Ok(cur)) => c > cur,
        _ => false,
    }
}
