use thiserror::Error;

/// Every distinct failure kind a query can raise, either at validation
/// time or while compiling a validated query into SQL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query is missing a 'select' object")]
    MissingSelect,
    #[error("'select.key' must be an array of column names")]
    SelectKeyNotArray,
    #[error("'select.value' must be an array of column names")]
    SelectValueNotArray,
    #[error("'select.key' must not be empty")]
    EmptySelectKey,
    #[error("query is missing a 'from' string")]
    MissingFrom,
    #[error("'order_by' must be a list of strings or {{column: \"asc\"|\"desc\"}} objects")]
    MalformedOrderBy,
    #[error("'language' is not a valid BCP-47-like tag: {0}")]
    MalformedLanguage(String),
    #[error("join binding variable '{0}' is malformed, expected '$name'")]
    MalformedJoinVariable(String),
    #[error("'from' value '{0}' is not supported")]
    NotSupported(String),
    #[error("no table registered for key '{0}'")]
    UnknownTable(String),
    #[error("where clause is malformed: {0}")]
    MalformedWhere(String),
    #[error("unknown join binding '{0}' referenced in where clause")]
    UnknownJoinBinding(String),
    #[error("join target '{0}' bound twice with conflicting 'on' columns")]
    ConflictingJoinOn(String),
    #[error("schema error: {0}")]
    Schema(#[from] ddf_schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
