//! Dotted-triple versions for model artifacts.
//!
//! Model versions are compared numerically, component by component. Parsing
//! never fails: anything that is not a non-negative integer becomes `0` in
//! its slot, so a malformed remote entry can never crash a staleness check.

use std::fmt;

/// A `major.minor.patch` version of a single model artifact.
///
/// Ordering is lexicographic over `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModelVersion {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

impl ModelVersion {
    /// Build a version from its three components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a dotted string such as `"1.2.0"`.
    ///
    /// Surrounding whitespace and a leading `v` are ignored. Missing or
    /// non-numeric components parse as `0`; components past the third are
    /// ignored.
    ///
    /// ```
    /// use modelup_schema::ModelVersion;
    ///
    /// assert_eq!(ModelVersion::parse("1.x"), ModelVersion::new(1, 0, 0));
    /// assert_eq!(ModelVersion::parse(""), ModelVersion::new(0, 0, 0));
    /// ```
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let mut parts = trimmed
            .split('.')
            .map(|p| p.trim().parse::<u64>().unwrap_or(0));

        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// The version as a `(major, minor, patch)` tuple.
    pub const fn as_tuple(self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<&str> for ModelVersion {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Returns true if `candidate` is strictly newer than `installed`.
///
/// Equal versions are never newer.
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    ModelVersion::parse(candidate) > ModelVersion::parse(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        assert_eq!(ModelVersion::parse("1.2.3").as_tuple(), (1, 2, 3));
        assert_eq!(ModelVersion::parse("10.0.42").as_tuple(), (10, 0, 42));
        assert_eq!(ModelVersion::parse(" v2.1.0 ").as_tuple(), (2, 1, 0));
    }

    #[test]
    fn test_parse_malformed_never_fails() {
        assert_eq!(ModelVersion::parse("").as_tuple(), (0, 0, 0));
        assert_eq!(ModelVersion::parse("abc").as_tuple(), (0, 0, 0));
        assert_eq!(ModelVersion::parse("1.x").as_tuple(), (1, 0, 0));
        assert_eq!(ModelVersion::parse("1..3").as_tuple(), (1, 0, 3));
        assert_eq!(ModelVersion::parse("-1.2.3").as_tuple(), (0, 2, 3));
        assert_eq!(ModelVersion::parse("1.2").as_tuple(), (1, 2, 0));
        assert_eq!(ModelVersion::parse("1.2.3.4").as_tuple(), (1, 2, 3));
    }

    #[test]
    fn test_is_newer() {
        assert!(is_newer("1.1.0", "1.0.9"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("0.9.9", "1.0.0"));
        assert!(is_newer("1.0.10", "1.0.9"));
        assert!(is_newer("2.0.0", "1.99.99"));
    }

    #[test]
    fn test_is_newer_numeric_not_lexical() {
        // "1.10.0" sorts before "1.9.0" as a string but is newer numerically
        assert!(is_newer("1.10.0", "1.9.0"));
        assert!(!is_newer("1.9.0", "1.10.0"));
    }

    #[test]
    fn test_display_round_trips_canonical_form() {
        assert_eq!(ModelVersion::parse("v1.2").to_string(), "1.2.0");
    }
}
