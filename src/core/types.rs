//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`LayoutVersion`] - On-disk metadata format revision
//! - [`LayoutRange`] - Closed range of layout versions a build can mount
//! - [`EnlistmentId`] - Canonical identity of one enlistment
//! - [`SessionId`] - Identity of one live mount session
//!
//! # Validation
//!
//! These types enforce validity at construction time. A layout version
//! parsed from text is compared numerically, never lexically.
//!
//! # Examples
//!
//! ```
//! use vmount::core::types::LayoutVersion;
//!
//! let v: LayoutVersion = "12".parse().unwrap();
//! assert_eq!(v.get(), 12);
//! assert!(LayoutVersion::new(9) < LayoutVersion::new(10));
//! assert!("ten".parse::<LayoutVersion>().is_err());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The disk layout version written by this build.
pub const CURRENT_DISK_LAYOUT_VERSION: u64 = 12;

/// The oldest disk layout version this build can upgrade from.
pub const MIN_SUPPORTED_DISK_LAYOUT_VERSION: u64 = 7;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid disk layout version: {0:?}")]
    InvalidLayoutVersion(String),

    #[error("invalid layout range: minimum {min} is above current {current}")]
    InvalidLayoutRange { min: u64, current: u64 },
}

/// A disk layout version.
///
/// Serialized as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutVersion(u64);

impl LayoutVersion {
    /// Wrap a raw version number.
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The raw version number.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The version immediately after this one, saturating at `u64::MAX`.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl FromStr for LayoutVersion {
    type Err = TypeError;

    /// Parse a decimal version string.
    ///
    /// Surrounding whitespace is ignored. Signs, fractions and values that do
    /// not fit in 64 bits are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidLayoutVersion(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidLayoutVersion(s.to_string()))
    }
}

impl fmt::Display for LayoutVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed range `[min_supported, current]` of layout versions a build
/// understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRange {
    min_supported: LayoutVersion,
    current: LayoutVersion,
}

impl LayoutRange {
    /// Build a range, rejecting `min_supported > current`.
    pub fn new(min_supported: u64, current: u64) -> Result<Self, TypeError> {
        if min_supported > current {
            return Err(TypeError::InvalidLayoutRange {
                min: min_supported,
                current,
            });
        }
        Ok(Self {
            min_supported: LayoutVersion(min_supported),
            current: LayoutVersion(current),
        })
    }

    /// The range supported by this build.
    pub const fn this_build() -> Self {
        Self {
            min_supported: LayoutVersion(MIN_SUPPORTED_DISK_LAYOUT_VERSION),
            current: LayoutVersion(CURRENT_DISK_LAYOUT_VERSION),
        }
    }

    pub fn min_supported(&self) -> LayoutVersion {
        self.min_supported
    }

    pub fn current(&self) -> LayoutVersion {
        self.current
    }
}

impl Default for LayoutRange {
    fn default() -> Self {
        Self::this_build()
    }
}

/// Identity of an enlistment: its canonical root path.
///
/// Two working directories inside the same enlistment always resolve to
/// the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnlistmentId(PathBuf);

impl EnlistmentId {
    /// Create an id from an already-canonical root path.
    pub fn from_canonical_root(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for EnlistmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Identity of one mount session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod layout_version {
        use super::*;

        #[test]
        fn parses_plain_decimal() {
            let v: LayoutVersion = "12".parse().unwrap();
            assert_eq!(v.get(), 12);
        }

        #[test]
        fn trims_whitespace() {
            let v: LayoutVersion = " 7\n".parse().unwrap();
            assert_eq!(v.get(), 7);
        }

        #[test]
        fn rejects_non_numeric() {
            assert!("".parse::<LayoutVersion>().is_err());
            assert!("abc".parse::<LayoutVersion>().is_err());
            assert!("-1".parse::<LayoutVersion>().is_err());
            assert!("+1".parse::<LayoutVersion>().is_err());
            assert!("1.5".parse::<LayoutVersion>().is_err());
        }

        #[test]
        fn rejects_overflow() {
            assert!("99999999999999999999999".parse::<LayoutVersion>().is_err());
        }

        #[test]
        fn ordering_is_numeric_not_lexical() {
            let nine: LayoutVersion = "9".parse().unwrap();
            let ten: LayoutVersion = "10".parse().unwrap();
            assert!(nine < ten);
            assert!("9" > "10");
        }

        #[test]
        fn leading_zeros_compare_equal() {
            let a: LayoutVersion = "012".parse().unwrap();
            assert_eq!(a, LayoutVersion::new(12));
        }

        #[test]
        fn next_saturates() {
            assert_eq!(LayoutVersion::new(u64::MAX).next().get(), u64::MAX);
            assert_eq!(LayoutVersion::new(3).next().get(), 4);
        }

        #[test]
        fn serde_is_bare_number() {
            let json = serde_json::to_string(&LayoutVersion::new(12)).unwrap();
            assert_eq!(json, "12");
        }
    }

    mod layout_range {
        use super::*;

        #[test]
        fn this_build_matches_constants() {
            let range = LayoutRange::this_build();
            assert_eq!(range.min_supported().get(), MIN_SUPPORTED_DISK_LAYOUT_VERSION);
            assert_eq!(range.current().get(), CURRENT_DISK_LAYOUT_VERSION);
        }

        #[test]
        fn rejects_inverted_range() {
            assert_eq!(
                LayoutRange::new(5, 4),
                Err(TypeError::InvalidLayoutRange { min: 5, current: 4 })
            );
        }

        #[test]
        fn single_version_range_is_valid() {
            let range = LayoutRange::new(4, 4).unwrap();
            assert_eq!(range.min_supported(), range.current());
        }
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
