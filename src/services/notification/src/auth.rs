//! Shared-secret authentication for API routes
//!
//! Accepts the configured key in `X-API-Key` or as an `Authorization: Bearer`
//! token. When no key is configured every request passes.

use crate::error::NotificationError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Configured key, if any
pub type ApiKey = Option<Arc<str>>;

pub async fn require_api_key(
    State(api_key): State<ApiKey>,
    request: Request,
    next: Next,
) -> Result<Response, NotificationError> {
    let Some(expected) = api_key else {
        return Ok(next.run(request).await);
    };

    let rejection = match presented_key(request.headers()) {
        Some(key) if key == &*expected => None,
        Some(_) => Some("invalid API key"),
        None => Some("missing API key"),
    };

    match rejection {
        None => Ok(next.run(request).await),
        Some(reason) => {
            warn!(path = %request.uri().path(), "Rejected API request: {}", reason);
            Err(NotificationError::auth(reason))
        }
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
        })
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_presented_key_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert_eq!(presented_key(&headers), Some("secret"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        assert_eq!(presented_key(&headers), Some("from-header"));
    }

    #[test]
    fn test_other_authorization_schemes_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(presented_key(&headers), None);
    }
}
