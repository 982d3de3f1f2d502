use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Cross-origin policy for the storefront web client.
///
/// Only exact origins from the allow-list get CORS headers, `*` admits any origin.
/// Requests without an `Origin` header (server-to-server, the payment gateway) are untouched.
pub fn build_cors(allowed_origins: &[String]) -> CorsLayer {
    let allowed = allowed_origins.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts| {
                let origin = origin.to_str().unwrap_or("");
                allowed.iter().any(|a| a == "*" || a == origin)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}
