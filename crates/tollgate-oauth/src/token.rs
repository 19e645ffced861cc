//! Token issuer: the device's polling endpoint and refresh-token exchange.

use serde_json::Value;
use tracing::info;

use tollgate_config::ProxyConfig;
use tollgate_store::Store;

use crate::device::{self, DeviceStatus};
use crate::error::{OAuthError, Result};
use crate::ratelimit::RateLimiter;

/// The device-code grant type this proxy serves.
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Form fields of a `POST /device/token` request.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub client_id: Option<String>,
    pub grant_type: Option<String>,
    pub device_code: Option<String>,
    pub usage_points_id: Option<String>,
    pub refresh_token: Option<String>,
}

/// Dispatch a token request to the grant it names.
pub async fn handle(
    store: &dyn Store,
    limiter: &RateLimiter,
    config: &ProxyConfig,
    request: TokenRequest,
    client_ip: &str,
) -> Result<Value> {
    let grant_type = match (&request.client_id, &request.grant_type) {
        (Some(c), Some(g)) if !c.is_empty() && !g.is_empty() => g.clone(),
        _ => {
            return Err(OAuthError::InvalidRequest(
                "Missing client_id or grant_type".to_string(),
            ));
        }
    };

    match grant_type.as_str() {
        DEVICE_CODE_GRANT => poll(store, limiter, request.device_code.as_deref()).await,
        "refresh_token" => refresh(store, limiter, config, &request, client_ip).await,
        other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
    }
}

/// Serve one poll from the device.
///
/// Delivery is one-time: the completed record is deleted before the token
/// object is returned, so the next poll (or a racing one that lost) sees
/// `invalid_grant`.
pub async fn poll(
    store: &dyn Store,
    limiter: &RateLimiter,
    device_code: Option<&str>,
) -> Result<Value> {
    let device_code = match device_code {
        Some(d) if !d.is_empty() => d,
        _ => return Err(OAuthError::InvalidRequest("Missing device_code".to_string())),
    };

    if !limiter.allow(device_code).await? {
        return Err(OAuthError::SlowDown);
    }

    let request = device::load_request(store, device_code)
        .await?
        .ok_or_else(|| OAuthError::InvalidGrant("device_code not found".to_string()))?;

    match request.status {
        DeviceStatus::Pending => Err(OAuthError::AuthorizationPending),
        DeviceStatus::Complete => {
            store.delete(device_code).await?;
            let token = request
                .token_response
                .ok_or_else(|| OAuthError::InvalidGrant("Authorization unsuccessful".to_string()))?;
            info!("Device poll delivered token response");
            Ok(token)
        }
    }
}

/// Exchange a proxy-issued refresh token for a fresh access token.
///
/// This is a server-to-server path: `client_id` must be the proxy's own
/// configured identity, not the device's. The refresh token is not
/// rotated — the caller keeps using the one it has.
async fn refresh(
    store: &dyn Store,
    limiter: &RateLimiter,
    config: &ProxyConfig,
    request: &TokenRequest,
    client_ip: &str,
) -> Result<Value> {
    if request.client_id.as_deref() != config.client_id.as_deref() || config.client_id.is_none() {
        return Err(OAuthError::InvalidRequest("Bad client_id".to_string()));
    }
    let usage_points = request
        .usage_points_id
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("Missing usage_points_id".to_string()))?;
    let refresh_token = request
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh_token".to_string()))?;

    if !limiter.allow(&format!("ip-{client_ip}")).await? {
        return Err(OAuthError::SlowDown);
    }

    let bound = store
        .get(&format!("refresh_token:{refresh_token}"))
        .await?
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| {
            OAuthError::InvalidRequest("refresh_token not found in database".to_string())
        })?;

    if bound != usage_points {
        return Err(OAuthError::InvalidRequest(
            "refresh_token not corresponding to usage_points_id".to_string(),
        ));
    }

    let access_token = mint_token(store, "access_token:").await?;
    store
        .put(
            &format!("access_token:{access_token}"),
            Value::String(usage_points.to_string()),
            config.access_token_ttl,
        )
        .await?;

    info!("Access token refreshed");

    Ok(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "Bearer",
        "expires_in": config.access_token_ttl.as_secs(),
        "scope": "",
    }))
}

/// Draw token candidates until one does not collide with an existing
/// record under `prefix`. The candidate space is 256-bit, so a retry is
/// already an anomaly worth logging.
pub(crate) async fn mint_token(store: &dyn Store, prefix: &str) -> Result<String> {
    loop {
        let candidate = device::random_hex(32);
        if store.get(&format!("{prefix}{candidate}")).await?.is_none() {
            return Ok(candidate);
        }
        tracing::warn!(prefix, "Token candidate collided, retrying");
    }
}
