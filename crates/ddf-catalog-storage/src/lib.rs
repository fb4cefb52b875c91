//! DDF Catalog Storage
//!
//! Storage backend abstraction plus the Catalog component itself:
//! list/lookup/insertNew/markDefault/ensureDefault/remove/purge over
//! the persisted `(name, version)` table.

mod backend;
mod catalog;

pub use backend::{CatalogBackend, GcsBackend, LocalSqliteBackend, S3Backend};
pub use catalog::{Catalog, CatalogListEntry, CatalogRecord, RemovalOutcome, RemoveTarget};
pub use ddf_catalog_core::{CatalogError, Result};
