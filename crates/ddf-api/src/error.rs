//! HTTP error envelope and the mapping from internal error kinds to
//! status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The abstract error kinds a query/catalog operation can fail with,
/// independent of how the caller reached the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    QuerySyntax(String),
    QuerySemantic(String),
    NotFound(String),
    Unauthorized(String),
    Busy(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::QuerySyntax(_) | ApiError::QuerySemantic(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::QuerySyntax(m)
            | ApiError::QuerySemantic(m)
            | ApiError::NotFound(m)
            | ApiError::Unauthorized(m)
            | ApiError::Busy(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = self.message(), "request failed");
        }
        (status, Json(ErrorBody { error: self.message().to_string() })).into_response()
    }
}

impl From<ddf_catalog_core::CatalogError> for ApiError {
    fn from(err: ddf_catalog_core::CatalogError) -> Self {
        use ddf_catalog_core::CatalogError;
        match err {
            CatalogError::NotFound(msg) => ApiError::NotFound(msg),
            CatalogError::AlreadyExists(msg) => ApiError::QuerySemantic(msg),
            CatalogError::InvalidName(_) | CatalogError::InvalidVersion(_, _) => {
                ApiError::QuerySemantic(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ddf_query::QueryError> for ApiError {
    fn from(err: ddf_query::QueryError) -> Self {
        use ddf_query::QueryError;
        match err {
            QueryError::Schema(_) => ApiError::QuerySemantic(err.to_string()),
            _ => ApiError::QuerySyntax(err.to_string()),
        }
    }
}

impl From<ddf_table::TableEngineError> for ApiError {
    fn from(err: ddf_table::TableEngineError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::pool::PoolError> for ApiError {
    fn from(err: crate::pool::PoolError) -> Self {
        match err {
            crate::pool::PoolError::AcquireTimeout(_) => ApiError::Busy(err.to_string()),
            crate::pool::PoolError::Reset(_) => ApiError::Internal(err.to_string()),
        }
    }
}

pub fn internal_error(message: impl Into<String>) -> ApiError {
    ApiError::Internal(message.into())
}

pub fn not_found(message: impl Into<String>) -> ApiError {
    ApiError::NotFound(message.into())
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::QuerySyntax(message.into())
}
