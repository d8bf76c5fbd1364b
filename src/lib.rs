//! vmount - mount manager for virtualized repository enlistments
//!
//! An enlistment is a working copy whose files are projected to
//! applications on demand. Before projection can start, vmount makes sure
//! the enlistment is safe to mount: no other mount is live, the on-disk
//! layout was written by a compatible build, and the support files the
//! projection relies on are in place.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Mount lifecycle: exclusivity, gating, repair, maintenance
//! - [`core`] - Domain types, enlistment layout, metadata, config, locking
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. At most one live mount per enlistment
//! 2. The persisted disk layout version only changes through a successful
//!    upgrade
//! 3. A rejected or failed mount leaves no live session
//! 4. Artifact repair is idempotent

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
