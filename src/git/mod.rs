//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2`. The mount engine uses it to keep `core.hooksPath` pointed at
//! the enlistment's hook directory and to create repositories for new
//! enlistments.

mod interface;

pub use interface::{Git, GitError, HOOKS_PATH_KEY};
