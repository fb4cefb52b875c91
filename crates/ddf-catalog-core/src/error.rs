/// Errors that can occur in catalog operations.
///
/// These are the concrete, crate-local shape of the abstract error kinds
/// in the service design: `Conflict`, `NotFound`, and `Internal` map
/// directly; `SchemaValidation` and the HTTP-facing kinds live closer to
/// their respective crates (`ddf-query`, `ddf-api`).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid dataset name '{0}': must match [-a-z_0-9]+")]
    InvalidName(String),

    #[error("invalid version '{0}': {1}")]
    InvalidVersion(String, &'static str),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("other error: {0}")]
    Other(String),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
