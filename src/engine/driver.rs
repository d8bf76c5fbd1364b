//! engine::driver
//!
//! Seams to the collaborators the mount engine does not implement.
//!
//! # Traits
//!
//! - [`ProjectionDriver`] - serves the projected file view once a mount is
//!   active
//! - [`Upgrader`] - migrates an enlistment's on-disk layout when the gate
//!   reports it is behind
//!
//! # Built-in Implementations
//!
//! - [`PassthroughDriver`] - for hosts where projection is served
//!   elsewhere; records the hand-off and does nothing else
//! - [`MetadataUpgrader`] - rewrites the version record, for layouts whose
//!   revisions changed nothing but the record itself
//!
//! Both traits are object safe and `Send + Sync` so a controller can be
//! shared across threads.

use thiserror::Error;
use tracing::{debug, info};

use crate::core::enlistment::Enlistment;
use crate::core::metadata::MetadataStore;
use crate::core::paths::EnlistmentPaths;
use crate::core::types::LayoutVersion;

/// Errors reported by a projection driver.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors reported by an upgrader.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UpgradeError {
    pub message: String,
}

impl UpgradeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Serves the projected file view for a mounted enlistment.
pub trait ProjectionDriver: Send + Sync {
    /// Begin projecting. Called once the mount has reached `Active`.
    fn start_projecting(&self, enlistment: &Enlistment) -> Result<(), DriverError>;

    /// Stop projecting. Called on unmount and when a mount is rolled back.
    fn stop_projecting(&self, enlistment: &Enlistment) -> Result<(), DriverError>;
}

/// Migrates an enlistment's on-disk layout.
pub trait Upgrader: Send + Sync {
    /// Upgrade from `from` to `to`.
    ///
    /// On failure nothing observable may have changed: the persisted
    /// version must still read `from`.
    fn upgrade(
        &self,
        paths: &EnlistmentPaths,
        from: LayoutVersion,
        to: LayoutVersion,
    ) -> Result<(), UpgradeError>;
}

/// Projection driver that only logs the hand-off.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDriver;

impl ProjectionDriver for PassthroughDriver {
    fn start_projecting(&self, enlistment: &Enlistment) -> Result<(), DriverError> {
        info!(enlistment = %enlistment.id(), "projection handed off");
        Ok(())
    }

    fn stop_projecting(&self, enlistment: &Enlistment) -> Result<(), DriverError> {
        info!(enlistment = %enlistment.id(), "projection released");
        Ok(())
    }
}

/// Upgrader that rewrites the version record in one atomic write.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataUpgrader;

impl Upgrader for MetadataUpgrader {
    fn upgrade(
        &self,
        paths: &EnlistmentPaths,
        from: LayoutVersion,
        to: LayoutVersion,
    ) -> Result<(), UpgradeError> {
        debug!(%from, %to, "rewriting layout version record");
        let store = MetadataStore::new(paths);
        let current = store
            .load()
            .map_err(|e| UpgradeError::new(e.to_string()))?;

        if current.disk_layout_version != from {
            return Err(UpgradeError::new(format!(
                "expected layout version {} on disk, found {}",
                from, current.disk_layout_version
            )));
        }

        store
            .save(&current.with_layout_version(to))
            .map_err(|e| UpgradeError::new(e.to_string()))
    }
}
