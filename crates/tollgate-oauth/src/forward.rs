//! Data forwarder: bearer-validated pass-through to the downstream API.
//!
//! The device calls the proxy with a token the proxy issued; the proxy
//! calls the downstream API with its own service token. The two credential
//! domains never mix — the device's bearer is only ever looked up in the
//! store, and the service token never leaves the outbound call.

use tollgate_config::ProxyConfig;
use tollgate_store::Store;

use crate::credentials::CredentialManager;
use crate::error::{OAuthError, Result};
use crate::ratelimit::RateLimiter;
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// One inbound data-proxy request.
#[derive(Debug, Clone, Default)]
pub struct DataRequest {
    /// Downstream path, relative to the data endpoint.
    pub path: String,
    /// Usage point the caller wants to read.
    pub usage_point_id: Option<String>,
    /// Raw `Authorization` header value, if any.
    pub authorization: Option<String>,
    /// Full query string of the inbound request, forwarded as-is.
    pub query: Vec<(String, String)>,
    /// Caller address for rate limiting.
    pub client_ip: String,
}

/// Validate the caller and forward the request downstream.
///
/// On an upstream 403 the service credential is renewed and the call
/// retried exactly once; whatever comes back then is passed through.
pub async fn forward(
    store: &dyn Store,
    limiter: &RateLimiter,
    credentials: &CredentialManager,
    upstream: &dyn UpstreamClient,
    config: &ProxyConfig,
    request: DataRequest,
) -> Result<UpstreamResponse> {
    if request.path.is_empty() {
        return Err(OAuthError::InvalidRequest("path empty".to_string()));
    }
    let usage_point_id = request
        .usage_point_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("Missing usage_point_id".to_string()))?;

    if !config.disable_data_auth {
        authorize_bearer(store, request.authorization.as_deref(), usage_point_id).await?;
    }

    if !limiter.allow(&format!("ip-{}", request.client_ip)).await? {
        return Err(OAuthError::SlowDown);
    }

    let data_endpoint = config
        .data_endpoint
        .as_deref()
        .ok_or_else(|| OAuthError::Config("DATA_ENDPOINT is not set".to_string()))?;
    let url = format!("{}/{}", data_endpoint.trim_end_matches('/'), request.path);

    let token = credentials.service_token().await.map_err(cannot_get_credentials)?;
    let mut response = upstream
        .get_data(&url, &request.query, &token.authorization())
        .await?;

    if response.status == 403 {
        let token = credentials.renew().await.map_err(cannot_get_credentials)?;
        response = upstream
            .get_data(&url, &request.query, &token.authorization())
            .await?;
    }

    Ok(response)
}

/// Check the caller's bearer against the issued-token records.
async fn authorize_bearer(
    store: &dyn Store,
    authorization: Option<&str>,
    usage_point_id: &str,
) -> Result<()> {
    let header = authorization.ok_or(OAuthError::Unauthorized {
        description: "Authorization missing".to_string(),
        status: 404,
    })?;
    let bearer = header.strip_prefix("Bearer ").unwrap_or(header);

    let bound = store
        .get(&format!("access_token:{bearer}"))
        .await?
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or(OAuthError::Unauthorized {
            description: "Access token not found".to_string(),
            status: 403,
        })?;

    if !bound.split(',').any(|u| u == usage_point_id) {
        return Err(OAuthError::Unauthorized {
            description: "Bad access token".to_string(),
            status: 404,
        });
    }

    Ok(())
}

fn cannot_get_credentials(_: OAuthError) -> OAuthError {
    OAuthError::Unauthorized {
        description: "Cannot get client credentials".to_string(),
        status: 404,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::ScriptedUpstream;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tollgate_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        limiter: RateLimiter,
        credentials: CredentialManager,
        upstream: Arc<ScriptedUpstream>,
        config: ProxyConfig,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let upstream = Arc::new(ScriptedUpstream::new());
        let config = ProxyConfig::default()
            .with_client_id("proxy")
            .with_client_secret("s3cret")
            .with_credentials_endpoint("https://up.example.com/token/v3")
            .with_data_endpoint("https://data.example.com/v5");
        let credentials = CredentialManager::new(
            store.clone(),
            Arc::new(config.clone()),
            upstream.clone(),
        );
        let limiter = RateLimiter::new(store.clone(), 100);
        Fixture {
            store,
            limiter,
            credentials,
            upstream,
            config,
        }
    }

    async fn issue_token(store: &MemoryStore, token: &str, usage_points: &str) {
        store
            .put(
                &format!("access_token:{token}"),
                json!(usage_points),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
    }

    async fn cache_service_token(store: &MemoryStore) {
        store
            .put(
                crate::credentials::SERVICE_TOKEN_KEY,
                json!({"access_token": "svc", "token_type": "Bearer", "expires_in": 3600}),
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
    }

    fn request(usage_point: &str, bearer: Option<&str>) -> DataRequest {
        DataRequest {
            path: "metering_data/daily_consumption".to_string(),
            usage_point_id: Some(usage_point.to_string()),
            authorization: bearer.map(|b| format!("Bearer {b}")),
            query: vec![("usage_point_id".to_string(), usage_point.to_string())],
            client_ip: "10.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_forwards_with_service_token() {
        let f = fixture();
        issue_token(&f.store, "dev-tok", "123").await;
        cache_service_token(&f.store).await;
        f.upstream
            .push_response(Ok(UpstreamResponse::json(200, r#"{"data":[1,2,3]}"#)));

        let response = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("dev-tok")),
        )
        .await
        .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));

        let calls = f.upstream.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].url.ends_with("/metering_data/daily_consumption"));
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer svc"));
    }

    #[tokio::test]
    async fn test_missing_authorization_is_404() {
        let f = fixture();

        let err = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", None),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OAuthError::Unauthorized { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_unknown_bearer_is_403() {
        let f = fixture();

        let err = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("who-dis")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OAuthError::Unauthorized { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_usage_point_must_be_bound() {
        let f = fixture();
        issue_token(&f.store, "dev-tok", "111,222").await;

        let err = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("333", Some("dev-tok")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthError::Unauthorized { status: 404, .. }));

        // A bound one passes
        cache_service_token(&f.store).await;
        f.upstream
            .push_response(Ok(UpstreamResponse::json(200, "{}")));
        forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("222", Some("dev-tok")),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_renews_once_on_403() {
        let f = fixture();
        issue_token(&f.store, "dev-tok", "123").await;
        cache_service_token(&f.store).await;

        // First data call rejected, then the renewal grant, then the retry
        f.upstream
            .push_response(Ok(UpstreamResponse::json(403, r#"{"error":"expired"}"#)));
        f.upstream.push_response(Ok(UpstreamResponse::json(
            200,
            r#"{"access_token":"svc-2","expires_in":3600}"#,
        )));
        f.upstream
            .push_response(Ok(UpstreamResponse::json(200, r#"{"data":[]}"#)));

        let response = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("dev-tok")),
        )
        .await
        .unwrap();

        assert_eq!(response.status, 200);
        let calls = f.upstream.calls();
        assert_eq!(calls.len(), 3);
        // The retry used the renewed credential
        assert_eq!(calls[2].authorization.as_deref(), Some("Bearer svc-2"));
    }

    #[tokio::test]
    async fn test_second_403_passes_through() {
        let f = fixture();
        issue_token(&f.store, "dev-tok", "123").await;
        cache_service_token(&f.store).await;

        f.upstream
            .push_response(Ok(UpstreamResponse::json(403, r#"{"error":"expired"}"#)));
        f.upstream.push_response(Ok(UpstreamResponse::json(
            200,
            r#"{"access_token":"svc-2","expires_in":3600}"#,
        )));
        f.upstream
            .push_response(Ok(UpstreamResponse::json(403, r#"{"error":"still no"}"#)));

        let response = forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("dev-tok")),
        )
        .await
        .unwrap();

        // No third retry: the second 403 is the caller's problem
        assert_eq!(response.status, 403);
        assert_eq!(f.upstream.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_auth_disabled_skips_bearer_check() {
        let mut f = fixture();
        f.config = f.config.clone().with_disable_data_auth(true);
        cache_service_token(&f.store).await;
        f.upstream
            .push_response(Ok(UpstreamResponse::json(200, "{}")));

        forward(
            f.store.as_ref(),
            &f.limiter,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", None),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let f = fixture();
        let tight = RateLimiter::new(f.store.clone(), 1);
        issue_token(&f.store, "dev-tok", "123").await;
        cache_service_token(&f.store).await;
        f.upstream
            .push_response(Ok(UpstreamResponse::json(200, "{}")));

        forward(
            f.store.as_ref(),
            &tight,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("dev-tok")),
        )
        .await
        .unwrap();

        let err = forward(
            f.store.as_ref(),
            &tight,
            &f.credentials,
            f.upstream.as_ref(),
            &f.config,
            request("123", Some("dev-tok")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthError::SlowDown));
    }
}
