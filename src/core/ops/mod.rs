//! core::ops
//!
//! Operational primitives shared by the mount engine.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-enlistment mount lock

pub mod lock;

pub use lock::{LockError, MountLock};
