//! core::metadata::store
//!
//! Repository metadata storage in the enlistment's `.vmount` directory.
//!
//! # Atomicity
//!
//! Writes go to a temp file in the same directory, are flushed to disk and
//! then renamed over the record. A reader sees either the old record or the
//! new one, never a torn version string.
//!
//! # Missing vs Invalid
//!
//! A missing record and a record that cannot be parsed are distinct
//! failures: [`StoreError::NotFound`] versus [`StoreError::Metadata`].
//! Both mean the persisted layout version cannot be verified.
//!
//! # Example
//!
//! ```ignore
//! use vmount::core::metadata::store::MetadataStore;
//!
//! let store = MetadataStore::new(enlistment.paths());
//! let meta = store.load()?;
//! println!("layout version {}", meta.disk_layout_version);
//! ```

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::{parse_metadata, MetadataError, RepoMetadataV1};
use crate::core::paths::EnlistmentPaths;
use crate::core::types::LayoutVersion;

/// Errors from metadata storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record does not exist.
    #[error("repo metadata not found at '{}'", path.display())]
    NotFound { path: PathBuf },

    /// The record exists but could not be read.
    #[error("failed to read repo metadata '{}': {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The record could not be written.
    #[error("failed to write repo metadata '{}': {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize repo metadata: {0}")]
    SerializeError(String),

    /// The record exists but is not valid metadata.
    #[error("invalid repo metadata: {0}")]
    Metadata(#[from] MetadataError),
}

/// Metadata store for one enlistment.
pub struct MetadataStore<'a> {
    paths: &'a EnlistmentPaths,
}

impl<'a> MetadataStore<'a> {
    /// Create a store for the given enlistment paths.
    pub fn new(paths: &'a EnlistmentPaths) -> Self {
        Self { paths }
    }

    /// Path of the persisted record.
    pub fn path(&self) -> PathBuf {
        self.paths.metadata_path()
    }

    /// Load the record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the record is absent
    /// - [`StoreError::ReadError`] for other I/O failures
    /// - [`StoreError::Metadata`] if the contents are not valid metadata
    pub fn load(&self) -> Result<RepoMetadataV1, StoreError> {
        let path = self.path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { path });
            }
            Err(source) => return Err(StoreError::ReadError { path, source }),
        };
        Ok(parse_metadata(&contents)?)
    }

    /// Persist the record atomically.
    pub fn save(&self, metadata: &RepoMetadataV1) -> Result<(), StoreError> {
        let json = metadata
            .to_canonical_json()
            .map_err(|e| StoreError::SerializeError(e.to_string()))?;
        write_atomic(&self.path(), json.as_bytes())
    }

    /// Rewrite only the layout version of an existing record.
    pub fn save_disk_layout_version(&self, version: LayoutVersion) -> Result<(), StoreError> {
        let current = self.load()?;
        self.save(&current.with_layout_version(version))
    }
}

/// Write `contents` to `path` through a temp file and rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::WriteError {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let temp_path = path.with_extension("json.tmp");
    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }
    Ok(())
}
