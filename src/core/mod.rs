//! core
//!
//! Core domain types, schemas, and storage for vmount.
//!
//! # Modules
//!
//! - [`types`] - Strong types: LayoutVersion, LayoutRange, EnlistmentId
//! - [`paths`] - Centralized path routing for enlistment storage
//! - [`enlistment`] - Enlistment discovery from a working directory
//! - [`metadata`] - Repository metadata schema and storage
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Exclusive mount lock
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Every persisted write is atomic

pub mod config;
pub mod enlistment;
pub mod metadata;
pub mod ops;
pub mod paths;
pub mod types;
