//! core::metadata
//!
//! Repository metadata schema and storage.
//!
//! # Modules
//!
//! - [`schema`] - Metadata schema types (v1)
//! - [`store`] - Atomic storage under `.vmount/`
//!
//! # Schema Design
//!
//! - Self-describing: includes `kind` and `schema_version`
//! - Strict parsing: unknown fields are rejected
//! - Layout version is a JSON number, compared numerically

pub mod schema;
pub mod store;

pub use schema::{parse_metadata, MetadataError, RepoMetadataV1, METADATA_KIND, SCHEMA_VERSION};
pub use store::{MetadataStore, StoreError};
