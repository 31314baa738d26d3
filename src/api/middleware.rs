//! API Middleware - Identity extraction and request tracking

use axum::{middleware::Next, extract::Request, response::Response, http::HeaderMap};

use crate::validation::sanitize;

/// Header carrying the caller's asserted identity. Trusted as-is; the
/// trust boundary is made visible by threading the value explicitly into
/// every manager call instead of stashing it in ambient state.
pub const IDENTITY_HEADER: &str = "user";

/// Pull the asserted identity out of the request headers.
/// Missing, non-UTF-8, or empty-after-sanitize values are no identity.
pub fn identity(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(IDENTITY_HEADER)?.to_str().ok()?;
    let cleaned = sanitize(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Attach a request id to every response, for log correlation.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_identity_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(identity(&headers), None);

        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("  Maria "));
        assert_eq!(identity(&headers), Some("Maria".to_string()));

        headers.insert(IDENTITY_HEADER, HeaderValue::from_static("<b></b>"));
        assert_eq!(identity(&headers), None);
    }
}
