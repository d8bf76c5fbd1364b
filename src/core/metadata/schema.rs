//! core::metadata::schema
//!
//! Repository metadata schema (v1).
//!
//! # Schema Design
//!
//! The record is:
//! - Self-describing with `kind` and `schema_version`
//! - Strictly parsed (unknown fields rejected)
//!
//! `schema_version` versions this JSON envelope. `disk_layout_version` is
//! the enlistment's on-disk format revision and is what the layout gate
//! inspects. They move independently.
//!
//! # Example
//!
//! ```
//! use vmount::core::metadata::schema::{parse_metadata, RepoMetadataV1};
//! use vmount::core::types::LayoutVersion;
//!
//! let meta = RepoMetadataV1::new(LayoutVersion::new(12));
//! let json = meta.to_canonical_json().unwrap();
//! let parsed = parse_metadata(&json).unwrap();
//! assert_eq!(parsed.disk_layout_version, LayoutVersion::new(12));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::types::LayoutVersion;

/// The kind identifier for repository metadata.
pub const METADATA_KIND: &str = "vmount.repo-metadata";

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from metadata parsing.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse metadata: {0}")]
    ParseError(String),

    #[error("invalid kind '{found}', expected '{}'", METADATA_KIND)]
    InvalidKind { found: String },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct MetadataEnvelope {
    kind: String,
    schema_version: u32,
}

/// Parse metadata JSON with version dispatch.
///
/// # Errors
///
/// Returns an error if the JSON is malformed, the `kind` does not match,
/// the schema version is unknown, or the layout version is not a
/// non-negative integer.
pub fn parse_metadata(json: &str) -> Result<RepoMetadataV1, MetadataError> {
    let envelope: MetadataEnvelope =
        serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string()))?;

    if envelope.kind != METADATA_KIND {
        return Err(MetadataError::InvalidKind {
            found: envelope.kind,
        });
    }

    match envelope.schema_version {
        1 => serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string())),
        v => Err(MetadataError::UnsupportedVersion(v)),
    }
}

/// Repository metadata (v1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepoMetadataV1 {
    /// Kind identifier (always "vmount.repo-metadata")
    pub kind: String,

    /// Schema version (always 1 for this struct)
    pub schema_version: u32,

    /// On-disk layout revision of the enlistment
    pub disk_layout_version: LayoutVersion,

    /// Stable identity assigned when the enlistment was created
    pub enlistment_id: Uuid,

    /// When the enlistment was created
    pub created_at: DateTime<Utc>,
}

impl RepoMetadataV1 {
    /// Create metadata for a freshly created enlistment.
    pub fn new(disk_layout_version: LayoutVersion) -> Self {
        Self {
            kind: METADATA_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            disk_layout_version,
            enlistment_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    /// Copy of this record with a different layout version.
    pub fn with_layout_version(&self, version: LayoutVersion) -> Self {
        Self {
            disk_layout_version: version,
            ..self.clone()
        }
    }

    /// Serialize to pretty, stable JSON.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
