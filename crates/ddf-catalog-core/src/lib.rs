//! DDF Catalog Core
//!
//! Core types, errors, and SQLite schema shared by the dataset catalog
//! and the services built on top of it.

mod error;
mod password;
mod sqlite;
mod validation;

pub use error::{CatalogError, Result};
pub use password::{hash_password, verify_password};
pub use sqlite::init_sqlite_schema;
pub use validation::{
    validate_dataset_name, validate_stored_version, MAX_VERSION_LEN, RESERVED_ALL,
    RESERVED_LATEST,
};
