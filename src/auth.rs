//! Shared-Secret Authentication
//!
//! Requests carry the secret either in an `X-Token` header or a `token`
//! query parameter (the header wins when both are present).

use axum::http::HeaderMap;
use serde::Deserialize;

/// Query parameters shared by token-gated endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Pull the token out of a request.
pub fn extract_token<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    headers
        .get("x-token")
        .and_then(|v| v.to_str().ok())
        .or(query_token)
}

/// Compare a received token against the configured secret.
///
/// Constant-time over equal-length inputs to avoid leaking the match prefix.
pub fn token_matches(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

/// Convenience check for handlers: header first, then query parameter.
pub fn request_authorized(headers: &HeaderMap, query_token: Option<&str>, secret: &str) -> bool {
    extract_token(headers, query_token)
        .map(|token| token_matches(token, secret))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_matching_tokens() {
        assert!(token_matches("dev-secret-change-me", "dev-secret-change-me"));
    }

    #[test]
    fn test_mismatched_tokens() {
        assert!(!token_matches("wrong", "dev-secret-change-me"));
        assert!(!token_matches("dev-secret-change-mf", "dev-secret-change-me"));
    }

    #[test]
    fn test_different_lengths() {
        assert!(!token_matches("short", "a-much-longer-secret"));
        assert!(!token_matches("", "secret"));
    }

    #[test]
    fn test_header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("from-header"));

        assert_eq!(
            extract_token(&headers, Some("from-query")),
            Some("from-header")
        );
    }

    #[test]
    fn test_query_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, Some("from-query")), Some("from-query"));
        assert_eq!(extract_token(&headers, None), None);
    }

    #[test]
    fn test_request_authorized() {
        let headers = HeaderMap::new();
        assert!(request_authorized(&headers, Some("s3cret"), "s3cret"));
        assert!(!request_authorized(&headers, Some("nope"), "s3cret"));
        assert!(!request_authorized(&headers, None, "s3cret"));
    }
}
