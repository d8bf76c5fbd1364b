//! engine::error
//!
//! Mount failure taxonomy and exit codes.
//!
//! Every failure the mount controller can report is one [`MountError`]
//! variant. Each variant carries a human-readable message, a stable
//! classification tag ([`MountErrorKind::as_str`]) and a process exit code
//! ([`ExitCode`]). Callers branch on the kind, never on message text.
//!
//! # Exit Codes
//!
//! | code | meaning                 |
//! |------|-------------------------|
//! | 0    | success                 |
//! | 3    | generic failure         |
//! | 4    | already mounted         |
//! | 5    | not a valid enlistment  |
//! | 6    | metadata unreadable     |
//! | 7    | downgrade rejected      |
//! | 8    | layout too old          |
//! | 9    | upgrade failed          |
//! | 10   | artifact repair failed  |
//! | 11   | driver start failed     |
//! | 12   | not mounted             |
//!
//! In legacy mode "already mounted" exits 0 and every other failure exits 3.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::LayoutVersion;

use super::controller::MountState;

/// Product name used in operator-facing messages.
const PRODUCT: &str = "vmount";

/// A failed mount, unmount, or status request.
#[derive(Debug, Error)]
pub enum MountError {
    /// A live mount already exists for the enlistment.
    #[error("This repo is already mounted at '{}'", root.display())]
    AlreadyMounted { root: PathBuf },

    /// The working directory is not inside any enlistment.
    #[error("'{}' is not a valid {PRODUCT} enlistment", path.display())]
    InvalidEnlistment { path: PathBuf },

    /// The metadata record is missing or cannot be parsed.
    #[error("Failed to upgrade repo disk layout: {detail}. The on-disk version could not be determined; restore '{}' and mount again", path.display())]
    MetadataUnreadable { path: PathBuf, detail: String },

    /// The enlistment was written by a newer build.
    #[error("Changes to {PRODUCT} disk layout do not allow mounting after downgrade. Try mounting again using a more recent version of {PRODUCT}. (enlistment version {persisted}, this build supports up to {current})")]
    DowngradeRejected {
        persisted: LayoutVersion,
        current: LayoutVersion,
    },

    /// The enlistment is older than anything this build can upgrade.
    #[error("Breaking change to {PRODUCT} disk layout has been made since cloning. Enlistment disk layout version: {persisted}, minimum supported version: {min_supported}. Mounting is refused; please recreate the enlistment")]
    TooOldRejected {
        persisted: LayoutVersion,
        min_supported: LayoutVersion,
    },

    /// The upgrader could not bring the layout to the current version.
    #[error("Failed to upgrade repo disk layout from version {from} to {to}: {detail}")]
    UpgradeFailed {
        from: LayoutVersion,
        to: LayoutVersion,
        detail: String,
    },

    /// A runtime artifact is missing and could not be restored.
    #[error("Failed to repair runtime artifacts: {detail}")]
    RepairFailed { detail: String },

    /// The projection driver refused to start.
    #[error("Failed to start projection: {detail}")]
    DriverStartFailed { detail: String },

    /// Unmount was requested for an enlistment with no live mount.
    #[error("'{}' is not mounted", root.display())]
    NotMounted { root: PathBuf },

    /// The exclusivity lock could not be taken for a reason other than
    /// contention.
    #[error("Failed to acquire mount lock: {detail}")]
    Coordinator { detail: String },
}

/// Stable classification of a [`MountError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountErrorKind {
    AlreadyMounted,
    InvalidEnlistment,
    MetadataUnreadable,
    DowngradeRejected,
    TooOldRejected,
    UpgradeFailed,
    RepairFailed,
    DriverStartFailed,
    NotMounted,
    Coordinator,
}

impl MountErrorKind {
    /// Tag for scripts and structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MountErrorKind::AlreadyMounted => "already-mounted",
            MountErrorKind::InvalidEnlistment => "invalid-enlistment",
            MountErrorKind::MetadataUnreadable => "metadata-unreadable",
            MountErrorKind::DowngradeRejected => "downgrade-rejected",
            MountErrorKind::TooOldRejected => "too-old-rejected",
            MountErrorKind::UpgradeFailed => "upgrade-failed",
            MountErrorKind::RepairFailed => "repair-failed",
            MountErrorKind::DriverStartFailed => "driver-start-failed",
            MountErrorKind::NotMounted => "not-mounted",
            MountErrorKind::Coordinator => "coordinator",
        }
    }

    /// Exit code for this classification.
    pub fn exit_code(self) -> ExitCode {
        match self {
            MountErrorKind::AlreadyMounted => ExitCode::AlreadyMounted,
            MountErrorKind::InvalidEnlistment => ExitCode::InvalidEnlistment,
            MountErrorKind::MetadataUnreadable => ExitCode::MetadataUnreadable,
            MountErrorKind::DowngradeRejected => ExitCode::DowngradeRejected,
            MountErrorKind::TooOldRejected => ExitCode::TooOldRejected,
            MountErrorKind::UpgradeFailed => ExitCode::UpgradeFailed,
            MountErrorKind::RepairFailed => ExitCode::RepairFailed,
            MountErrorKind::DriverStartFailed => ExitCode::DriverStartFailed,
            MountErrorKind::NotMounted => ExitCode::NotMounted,
            MountErrorKind::Coordinator => ExitCode::GenericError,
        }
    }
}

impl std::fmt::Display for MountErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MountError {
    /// Classification of this error.
    pub fn kind(&self) -> MountErrorKind {
        match self {
            MountError::AlreadyMounted { .. } => MountErrorKind::AlreadyMounted,
            MountError::InvalidEnlistment { .. } => MountErrorKind::InvalidEnlistment,
            MountError::MetadataUnreadable { .. } => MountErrorKind::MetadataUnreadable,
            MountError::DowngradeRejected { .. } => MountErrorKind::DowngradeRejected,
            MountError::TooOldRejected { .. } => MountErrorKind::TooOldRejected,
            MountError::UpgradeFailed { .. } => MountErrorKind::UpgradeFailed,
            MountError::RepairFailed { .. } => MountErrorKind::RepairFailed,
            MountError::DriverStartFailed { .. } => MountErrorKind::DriverStartFailed,
            MountError::NotMounted { .. } => MountErrorKind::NotMounted,
            MountError::Coordinator { .. } => MountErrorKind::Coordinator,
        }
    }

    /// The mount state in which this failure is detected.
    pub fn detected_in(&self) -> MountState {
        match self.kind() {
            MountErrorKind::InvalidEnlistment | MountErrorKind::NotMounted => MountState::Unmounted,
            MountErrorKind::AlreadyMounted | MountErrorKind::Coordinator => MountState::Acquiring,
            MountErrorKind::MetadataUnreadable => MountState::LoadingMetadata,
            MountErrorKind::DowngradeRejected
            | MountErrorKind::TooOldRejected
            | MountErrorKind::UpgradeFailed => MountState::GatingVersion,
            MountErrorKind::RepairFailed => MountState::Repairing,
            MountErrorKind::DriverStartFailed => MountState::Active,
        }
    }

    /// Exit code under the chosen convention.
    pub fn exit_code(&self, legacy: bool) -> i32 {
        if legacy {
            match self.kind() {
                MountErrorKind::AlreadyMounted => ExitCode::Success.code(),
                _ => ExitCode::GenericError.code(),
            }
        } else {
            self.kind().exit_code().code()
        }
    }
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GenericError = 3,
    AlreadyMounted = 4,
    InvalidEnlistment = 5,
    MetadataUnreadable = 6,
    DowngradeRejected = 7,
    TooOldRejected = 8,
    UpgradeFailed = 9,
    RepairFailed = 10,
    DriverStartFailed = 11,
    NotMounted = 12,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_errors() -> Vec<MountError> {
        let v = LayoutVersion::new;
        vec![
            MountError::AlreadyMounted { root: "/r".into() },
            MountError::InvalidEnlistment { path: "/p".into() },
            MountError::MetadataUnreadable {
                path: "/r/.vmount/repo-metadata.json".into(),
                detail: "not found".into(),
            },
            MountError::DowngradeRejected {
                persisted: v(13),
                current: v(12),
            },
            MountError::TooOldRejected {
                persisted: v(1),
                min_supported: v(7),
            },
            MountError::UpgradeFailed {
                from: v(8),
                to: v(12),
                detail: "disk full".into(),
            },
            MountError::RepairFailed {
                detail: "x".into(),
            },
            MountError::DriverStartFailed {
                detail: "x".into(),
            },
            MountError::NotMounted { root: "/r".into() },
            MountError::Coordinator {
                detail: "x".into(),
            },
        ]
    }

    #[test]
    fn exit_codes_are_distinct_per_rejection_class() {
        let codes: HashSet<i32> = all_errors()
            .iter()
            .filter(|e| e.kind() != MountErrorKind::Coordinator)
            .map(|e| e.exit_code(false))
            .collect();
        assert_eq!(codes.len(), 9);
        assert!(!codes.contains(&0));
    }

    #[test]
    fn tags_are_distinct() {
        let tags: HashSet<&str> = all_errors().iter().map(|e| e.kind().as_str()).collect();
        assert_eq!(tags.len(), 10);
    }

    #[test]
    fn legacy_exit_codes() {
        for err in all_errors() {
            let expected = if err.kind() == MountErrorKind::AlreadyMounted {
                0
            } else {
                3
            };
            assert_eq!(err.exit_code(true), expected, "{}", err.kind());
        }
    }

    #[test]
    fn messages_keep_operator_substrings() {
        let errors = all_errors();
        assert!(errors[0].to_string().contains("already mounted"));
        assert!(errors[1].to_string().contains("is not a valid vmount enlistment"));
        assert!(errors[2]
            .to_string()
            .contains("Failed to upgrade repo disk layout"));
        assert!(errors[3]
            .to_string()
            .contains("do not allow mounting after downgrade"));
        assert!(errors[4]
            .to_string()
            .contains("Breaking change to vmount disk layout has been made since cloning"));
        assert!(errors[5]
            .to_string()
            .contains("Failed to upgrade repo disk layout"));
    }

    #[test]
    fn detected_states() {
        let errors = all_errors();
        assert_eq!(errors[0].detected_in(), MountState::Acquiring);
        assert_eq!(errors[1].detected_in(), MountState::Unmounted);
        assert_eq!(errors[2].detected_in(), MountState::LoadingMetadata);
        assert_eq!(errors[3].detected_in(), MountState::GatingVersion);
        assert_eq!(errors[6].detected_in(), MountState::Repairing);
    }
}
