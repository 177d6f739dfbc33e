//! Legacy path prefix handling.
//!
//! The API is served under `/api/v1` and, for older clients, under
//! `/rentabot/api/v1.0`. The legacy prefix either serves the same routes
//! with a `Deprecation` header or, when configured, answers a 307 redirect
//! to the primary prefix.

use axum::{
    extract::{OriginalUri, Request},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Primary API path prefix.
pub const PRIMARY_PREFIX: &str = "/api/v1";

/// Legacy API path prefix, kept for older clients.
pub const LEGACY_PREFIX: &str = "/rentabot/api/v1.0";

/// Middleware stamping legacy-prefix responses with a deprecation header.
pub async fn legacy_deprecation(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("Deprecation", HeaderValue::from_static("true"));
    response
}

/// Fallback handler redirecting any legacy-prefix request to its primary
/// equivalent with a 307, preserving method, body and query string.
pub async fn legacy_redirect(OriginalUri(uri): OriginalUri) -> Response {
    let original = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(LEGACY_PREFIX);
    let target = original.replacen(LEGACY_PREFIX, PRIMARY_PREFIX, 1);

    match HeaderValue::from_str(&target) {
        Ok(location) => {
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
