//! HTTP Basic authentication against a password-protected dataset
//! version's stored hash.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ddf_catalog_core::verify_password;

use crate::error::{ApiError, ErrorBody};

/// Require a password match if the looked-up record carries one.
/// `name` is used only for the `WWW-Authenticate` realm.
pub fn authorize(headers: &HeaderMap, name: &str, stored_hash: Option<&str>) -> Result<(), AuthChallenge> {
    let Some(stored_hash) = stored_hash else { return Ok(()) };

    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic);

    match provided {
        Some(password) if verify_password(&password, stored_hash) => Ok(()),
        _ => Err(AuthChallenge { dataset: name.to_string() }),
    }
}

fn decode_basic(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    // Basic auth is "user:password"; DDF service ignores the user part.
    let (_, password) = text.split_once(':')?;
    Some(password.to_string())
}

pub struct AuthChallenge {
    dataset: String,
}

impl IntoResponse for AuthChallenge {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            axum::Json(ErrorBody { error: "password required or incorrect".to_string() }),
        )
            .into_response();
        let realm = format!("Basic realm=\"Access to {} data\", charset=\"UTF-8\"", self.dataset);
        if let Ok(value) = HeaderValue::from_str(&realm) {
            response.headers_mut().insert(axum::http::header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl From<AuthChallenge> for ApiError {
    fn from(challenge: AuthChallenge) -> Self {
        ApiError::Unauthorized(format!("password required or incorrect for {}", challenge.dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddf_catalog_core::hash_password;

    fn headers_with_basic(user: &str, password: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let raw = format!("{user}:{password}");
        let encoded = BASE64.encode(raw);
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn unprotected_dataset_always_authorizes() {
        assert!(authorize(&HeaderMap::new(), "pop", None).is_ok());
    }

    #[test]
    fn missing_header_is_rejected_when_protected() {
        let hash = hash_password("secret");
        assert!(authorize(&HeaderMap::new(), "pop", Some(&hash)).is_err());
    }

    #[test]
    fn correct_password_authorizes() {
        let hash = hash_password("secret");
        let headers = headers_with_basic("anyone", "secret");
        assert!(authorize(&headers, "pop", Some(&hash)).is_ok());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let hash = hash_password("secret");
        let headers = headers_with_basic("anyone", "wrong");
        assert!(authorize(&headers, "pop", Some(&hash)).is_err());
    }
}
