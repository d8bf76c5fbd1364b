//! core::enlistment
//!
//! Enlistment discovery.
//!
//! A mount request names a working directory, not an enlistment. Discovery
//! walks from that directory towards the filesystem root and stops at the
//! first ancestor carrying a `.vmount` directory. Any path inside the
//! projected namespace therefore resolves to the same enlistment, which is
//! what lets a second mount from a nested folder be recognised as a
//! duplicate.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::paths::EnlistmentPaths;
use super::types::EnlistmentId;

/// Errors from enlistment discovery.
#[derive(Debug, Error)]
pub enum EnlistmentError {
    /// No ancestor of the start directory is an enlistment root.
    #[error("'{}' is not a valid vmount enlistment", path.display())]
    NotAnEnlistment { path: PathBuf },

    /// The start directory could not be resolved.
    #[error("cannot resolve '{}': {source}", path.display())]
    Unresolvable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One working copy of a tracked repository plus its projection root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enlistment {
    id: EnlistmentId,
    paths: EnlistmentPaths,
}

impl Enlistment {
    /// Find the enlistment containing `start`.
    ///
    /// # Errors
    ///
    /// - [`EnlistmentError::Unresolvable`] if `start` does not exist
    /// - [`EnlistmentError::NotAnEnlistment`] if no ancestor is a root
    pub fn discover(start: &Path) -> Result<Self, EnlistmentError> {
        let canonical = start
            .canonicalize()
            .map_err(|source| EnlistmentError::Unresolvable {
                path: start.to_path_buf(),
                source,
            })?;

        canonical
            .ancestors()
            .find(|dir| EnlistmentPaths::is_enlistment_root(dir))
            .map(|root| Self::from_canonical_root(root.to_path_buf()))
            .ok_or(EnlistmentError::NotAnEnlistment { path: canonical })
    }

    /// Open an enlistment whose root is already known.
    ///
    /// The root is canonicalized so ids stay comparable with discovered
    /// enlistments.
    pub fn open(root: &Path) -> Result<Self, EnlistmentError> {
        let canonical = root
            .canonicalize()
            .map_err(|source| EnlistmentError::Unresolvable {
                path: root.to_path_buf(),
                source,
            })?;
        if !EnlistmentPaths::is_enlistment_root(&canonical) {
            return Err(EnlistmentError::NotAnEnlistment { path: canonical });
        }
        Ok(Self::from_canonical_root(canonical))
    }

    fn from_canonical_root(root: PathBuf) -> Self {
        Self {
            id: EnlistmentId::from_canonical_root(root.clone()),
            paths: EnlistmentPaths::new(root),
        }
    }

    pub fn id(&self) -> &EnlistmentId {
        &self.id
    }

    pub fn paths(&self) -> &EnlistmentPaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::DOT_DIR_NAME;
    use std::fs;
    use tempfile::TempDir;

    fn make_enlistment() -> TempDir {
        let temp = TempDir::new().expect("create temp dir");
        fs::create_dir_all(temp.path().join(DOT_DIR_NAME)).unwrap();
        fs::create_dir_all(temp.path().join("src/deep/nested")).unwrap();
        temp
    }

    #[test]
    fn discover_from_root() {
        let temp = make_enlistment();
        let enlistment = Enlistment::discover(temp.path()).unwrap();
        assert_eq!(enlistment.root(), temp.path().canonicalize().unwrap());
    }

    #[test]
    fn discover_from_nested_directory_finds_same_root() {
        let temp = make_enlistment();
        let from_root = Enlistment::discover(temp.path()).unwrap();
        let from_nested = Enlistment::discover(&temp.path().join("src/deep/nested")).unwrap();
        assert_eq!(from_root.id(), from_nested.id());
    }

    #[test]
    fn discover_outside_enlistment_fails() {
        let temp = TempDir::new().unwrap();
        let err = Enlistment::discover(temp.path()).unwrap_err();
        assert!(matches!(err, EnlistmentError::NotAnEnlistment { .. }));
        assert!(err.to_string().contains("is not a valid vmount enlistment"));
    }

    #[test]
    fn discover_parent_of_enlistment_fails() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("enlistment");
        fs::create_dir_all(root.join(DOT_DIR_NAME)).unwrap();

        let err = Enlistment::discover(outer.path()).unwrap_err();
        assert!(matches!(err, EnlistmentError::NotAnEnlistment { .. }));
    }

    #[test]
    fn discover_missing_directory_is_unresolvable() {
        let temp = TempDir::new().unwrap();
        let err = Enlistment::discover(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, EnlistmentError::Unresolvable { .. }));
    }

    #[test]
    fn open_requires_root() {
        let temp = make_enlistment();
        assert!(Enlistment::open(temp.path()).is_ok());
        let err = Enlistment::open(&temp.path().join("src")).unwrap_err();
        assert!(matches!(err, EnlistmentError::NotAnEnlistment { .. }));
    }
}
