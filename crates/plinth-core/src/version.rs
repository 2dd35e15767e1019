// SPDX-FileCopyrightText: 2026 Plinth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient version parsing for manifest and repository version strings.
//!
//! Manifests written by other tooling use one to four dot-separated numeric
//! components (`1`, `1.2`, `10.9.0.0`). These are normalised to semver by
//! padding missing components with zero. A fourth component is only accepted
//! when it is zero, since semver has nowhere to keep it.

use semver::Version;

/// Sentinel version assigned to plugins whose version cannot be parsed.
pub const MINIMUM_VERSION: Version = Version::new(0, 0, 0);

/// Parses `input` as a version, returning `None` if it is not usable.
pub fn parse_version(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }

    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() > 4 {
        return None;
    }
    let mut numbers = [0u64; 4];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    if numbers[3] != 0 {
        return None;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// Parses `input`, falling back to [`MINIMUM_VERSION`].
pub fn parse_version_or_minimum(input: Option<&str>) -> Version {
    input.and_then(parse_version).unwrap_or(MINIMUM_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_semver() {
        assert_eq!(parse_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(
            parse_version("1.2.3-beta.1").map(|v| v.pre.to_string()),
            Some("beta.1".to_string())
        );
    }

    #[test]
    fn pads_short_versions() {
        assert_eq!(parse_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_version("1.1"), Some(Version::new(1, 1, 0)));
    }

    #[test]
    fn four_part_versions_need_zero_revision() {
        assert_eq!(parse_version("10.9.0.0"), Some(Version::new(10, 9, 0)));
        assert_eq!(parse_version("1.0.1.0"), Some(Version::new(1, 0, 1)));
        assert_eq!(parse_version("1.0.0.3"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_version(""), None);
        assert_eq!(parse_version("latest"), None);
        assert_eq!(parse_version("1..2"), None);
        assert_eq!(parse_version("1.2.3.4.5"), None);
        assert_eq!(parse_version("v1.2"), None);
    }

    #[test]
    fn minimum_fallback() {
        assert_eq!(parse_version_or_minimum(Some("nope")), MINIMUM_VERSION);
        assert_eq!(parse_version_or_minimum(None), MINIMUM_VERSION);
        assert_eq!(parse_version_or_minimum(Some("2.0")), Version::new(2, 0, 0));
    }
}
