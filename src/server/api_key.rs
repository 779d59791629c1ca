//! API key protection for the stream management routes.
//!
//! The key is accepted from the `X-API-Key` header or the `apikey` query
//! parameter and compared in constant time.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

/// Header carrying the API key.
pub static X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "apikey";

/// Configured API key shared by the middleware.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    /// Constant-time comparison against a presented key.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

/// Middleware rejecting requests without the configured API key.
pub async fn api_key_middleware(
    State(key): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(&X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query_key(request.uri().query()));

    match presented {
        Some(candidate) if key.matches(&candidate) => next.run(request).await,
        _ => {
            tracing::debug!(path = %request.uri().path(), "Rejected request without valid API key");
            (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({ "error": "invalid or missing API key" })),
            )
                .into_response()
        }
    }
}

fn query_key(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == API_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Generate a random API key for programmatic access
pub fn generate_api_key() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let key = ApiKey::new("s3cret");
        assert!(key.matches("s3cret"));
        assert!(!key.matches("s3cre"));
        assert!(!key.matches("s3cret "));
        assert!(!key.matches(""));
    }

    #[test]
    fn test_query_key() {
        assert_eq!(query_key(Some("a=1&apikey=abc%2Bd")).as_deref(), Some("abc+d"));
        assert_eq!(query_key(Some("a=1")), None);
        assert_eq!(query_key(None), None);
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert_eq!(key.len(), 43);
        assert_ne!(key, generate_api_key());
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
