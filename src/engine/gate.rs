//! engine::gate
//!
//! Disk layout version gating.
//!
//! # Architecture
//!
//! Gating decides whether an enlistment's persisted layout version can be
//! mounted by this build. It never mutates anything: an upgrade, when
//! needed, is the upgrader's job and happens only after the gate has
//! produced [`LayoutVerdict::NeedsUpgrade`].
//!
//! # Rules
//!
//! Applied in order:
//!
//! 1. `persisted > current` - downgrade, rejected
//! 2. `persisted < min_supported` - too old to upgrade, rejected
//! 3. `persisted < current` - needs upgrade
//! 4. otherwise current
//!
//! # Invariants
//!
//! - Gating is deterministic given the same inputs
//! - Comparison is numeric on [`LayoutVersion`]
//!
//! # Example
//!
//! ```
//! use vmount::core::types::{LayoutRange, LayoutVersion};
//! use vmount::engine::gate::{classify, LayoutVerdict};
//!
//! let range = LayoutRange::new(7, 12).unwrap();
//! assert_eq!(classify(LayoutVersion::new(12), &range), LayoutVerdict::Current);
//! assert!(matches!(
//!     classify(LayoutVersion::new(13), &range),
//!     LayoutVerdict::DowngradeRejected { .. }
//! ));
//! ```

use crate::core::types::{LayoutRange, LayoutVersion};

use super::error::MountError;

/// Result of classifying a persisted layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVerdict {
    /// Layout matches this build.
    Current,

    /// Layout is older but within upgrade reach.
    NeedsUpgrade {
        from: LayoutVersion,
        to: LayoutVersion,
    },

    /// Layout was written by a newer build.
    DowngradeRejected {
        persisted: LayoutVersion,
        current: LayoutVersion,
    },

    /// Layout predates the oldest version this build can upgrade.
    TooOldRejected {
        persisted: LayoutVersion,
        min_supported: LayoutVersion,
    },
}

impl LayoutVerdict {
    /// Whether mounting may continue (possibly after an upgrade).
    pub fn is_mountable(&self) -> bool {
        matches!(
            self,
            LayoutVerdict::Current | LayoutVerdict::NeedsUpgrade { .. }
        )
    }

    /// Convert a rejection into its mount error.
    ///
    /// Returns `None` for mountable verdicts.
    pub fn rejection(&self) -> Option<MountError> {
        match *self {
            LayoutVerdict::DowngradeRejected { persisted, current } => {
                Some(MountError::DowngradeRejected { persisted, current })
            }
            LayoutVerdict::TooOldRejected {
                persisted,
                min_supported,
            } => Some(MountError::TooOldRejected {
                persisted,
                min_supported,
            }),
            LayoutVerdict::Current | LayoutVerdict::NeedsUpgrade { .. } => None,
        }
    }
}

/// Classify `persisted` against `range`.
pub fn classify(persisted: LayoutVersion, range: &LayoutRange) -> LayoutVerdict {
    let current = range.current();
    let min_supported = range.min_supported();

    if persisted > current {
        LayoutVerdict::DowngradeRejected { persisted, current }
    } else if persisted < min_supported {
        LayoutVerdict::TooOldRejected {
            persisted,
            min_supported,
        }
    } else if persisted < current {
        LayoutVerdict::NeedsUpgrade {
            from: persisted,
            to: current,
        }
    } else {
        LayoutVerdict::Current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::MountErrorKind;

    fn range() -> LayoutRange {
        LayoutRange::new(7, 12).unwrap()
    }

    fn v(n: u64) -> LayoutVersion {
        LayoutVersion::new(n)
    }

    #[test]
    fn equal_is_current() {
        assert_eq!(classify(v(12), &range()), LayoutVerdict::Current);
    }

    #[test]
    fn above_current_is_downgrade() {
        assert_eq!(
            classify(v(13), &range()),
            LayoutVerdict::DowngradeRejected {
                persisted: v(13),
                current: v(12)
            }
        );
        assert!(matches!(
            classify(v(u64::MAX), &range()),
            LayoutVerdict::DowngradeRejected { .. }
        ));
    }

    #[test]
    fn below_minimum_is_too_old() {
        assert_eq!(
            classify(v(1), &range()),
            LayoutVerdict::TooOldRejected {
                persisted: v(1),
                min_supported: v(7)
            }
        );
        assert!(matches!(
            classify(v(0), &range()),
            LayoutVerdict::TooOldRejected { .. }
        ));
    }

    #[test]
    fn within_range_needs_upgrade() {
        for n in 7..12 {
            assert_eq!(
                classify(v(n), &range()),
                LayoutVerdict::NeedsUpgrade {
                    from: v(n),
                    to: v(12)
                }
            );
        }
    }

    #[test]
    fn single_version_range() {
        let range = LayoutRange::new(5, 5).unwrap();
        assert_eq!(classify(v(5), &range), LayoutVerdict::Current);
        assert!(matches!(
            classify(v(4), &range),
            LayoutVerdict::TooOldRejected { .. }
        ));
        assert!(matches!(
            classify(v(6), &range),
            LayoutVerdict::DowngradeRejected { .. }
        ));
    }

    #[test]
    fn two_digit_versions_compare_numerically() {
        let range = LayoutRange::new(9, 10).unwrap();
        let nine: LayoutVersion = "9".parse().unwrap();
        assert!(matches!(
            classify(nine, &range),
            LayoutVerdict::NeedsUpgrade { .. }
        ));
    }

    #[test]
    fn rejection_errors() {
        assert!(classify(v(12), &range()).rejection().is_none());
        assert!(classify(v(8), &range()).rejection().is_none());
        assert_eq!(
            classify(v(13), &range()).rejection().map(|e| e.kind()),
            Some(MountErrorKind::DowngradeRejected)
        );
        assert_eq!(
            classify(v(1), &range()).rejection().map(|e| e.kind()),
            Some(MountErrorKind::TooOldRejected)
        );
    }

    #[test]
    fn mountable() {
        assert!(classify(v(12), &range()).is_mountable());
        assert!(classify(v(10), &range()).is_mountable());
        assert!(!classify(v(13), &range()).is_mountable());
        assert!(!classify(v(2), &range()).is_mountable());
    }
}
