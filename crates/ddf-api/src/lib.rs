//! DDF HTTP API
//!
//! Listing, query, asset-redirect, and service-directory endpoints over
//! a dataset catalog, with admission control, password protection, and
//! response caching policy.

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod pool;
pub mod querystring;
pub mod routes;
pub mod state;
pub mod stream;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use state::AppState;
