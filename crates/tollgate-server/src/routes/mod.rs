//! API routes.

pub mod authorize;
pub mod data;
pub mod device;
pub mod health;

pub use authorize::{redirect_handler, verify_code_handler};
pub use data::data_proxy_handler;
pub use device::{
    access_token_handler, device_page_handler, generate_code_handler, index_handler,
    proxy_token_handler,
};
pub use health::health_handler;

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};

use tollgate_oauth::UpstreamResponse;

/// Best-effort caller address for rate limiting.
///
/// Behind a reverse proxy the peer address is the proxy's, so the first
/// `X-Forwarded-For` hop wins when present. Callers that spoof the header
/// only tighten their own bucket.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Relay an upstream response: status, content type, and body as received.
pub(crate) fn relay(upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::OK);

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &upstream.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    match builder.body(Body::from(upstream.body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Upstream response could not be relayed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_relay_passes_status_and_content_type() {
        let response = relay(UpstreamResponse {
            status: 418,
            content_type: Some("application/json".to_string()),
            body: "{}".to_string(),
        });
        assert_eq!(response.status(), 418);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
