//! Authorization redirector: user-code verification, CSRF state, and the
//! redirect callback that turns consent into tokens.
//!
//! `verify` is the browser's first stop: it binds the entered user code to
//! a one-time state value and bounces the user to the upstream
//! authorization server. `complete` is the way back: the upstream redirect
//! lands here, the state is consumed, and the waiting device request is
//! completed — either with tokens the proxy mints itself or with the
//! upstream's own token object, depending on the configured flow.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use tollgate_config::{FlowMode, ProxyConfig};
use tollgate_store::Store;

use crate::device::{self, COMPLETE_TTL, DeviceRequest, DeviceSession};
use crate::error::{OAuthError, Result};
use crate::token::mint_token;
use crate::upstream::UpstreamClient;

/// How long a minted CSRF state stays redeemable.
const STATE_TTL: Duration = Duration::from_secs(300);

/// CSRF state record, keyed `state:<value>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateRecord {
    user_code: String,
    timestamp: u64,
}

fn state_key(state: &str) -> String {
    format!("state:{state}")
}

/// Derive the PKCE code challenge from a verifier:
/// base64url (no padding) of the SHA-256 of the verifier bytes.
pub fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Validate an entered user code and build the upstream redirect.
///
/// `correlation` is an optional caller-supplied token appended to the
/// minted state so the caller can recognize its own flow when the redirect
/// returns. Returns the full authorization URL to redirect the browser to.
pub async fn verify(
    store: &dyn Store,
    config: &ProxyConfig,
    code: Option<&str>,
    correlation: Option<&str>,
) -> Result<String> {
    let code = match code {
        Some(c) if !c.is_empty() => c,
        _ => return Err(OAuthError::InvalidRequest("No code entered".to_string())),
    };

    let user_code = device::normalize_user_code(code);
    let session = device::lookup(store, &user_code)
        .await?
        .ok_or_else(|| OAuthError::InvalidRequest("Code not valid".to_string()))?;

    let mut state = device::random_hex(16);
    if let Some(suffix) = correlation.filter(|s| !s.is_empty()) {
        state.push_str(suffix);
    }

    let record = StateRecord {
        user_code,
        timestamp: unix_now(),
    };
    let value = serde_json::to_value(&record)
        .map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
    store.put(&state_key(&state), value, STATE_TTL).await?;

    info!(client_id = %session.client_id, "User code verified, redirecting to authorization server");

    Ok(build_authorization_url(config, &session, &state))
}

/// Assemble the upstream authorization URL.
fn build_authorization_url(config: &ProxyConfig, session: &DeviceSession, state: &str) -> String {
    let challenge;
    let mut params: Vec<(&str, &str)> = vec![
        ("response_type", "code"),
        ("client_id", &session.client_id),
        ("state", state),
    ];
    if let Some(duration) = &config.duration {
        params.push(("duration", duration));
    }
    if let Some(scope) = &session.scope {
        params.push(("scope", scope));
    }
    if let Some(redirect_uri) = &config.redirect_uri {
        params.push(("redirect_uri", redirect_uri));
    }

    if config.pkce {
        challenge = pkce_challenge(&session.pkce_verifier);
        params.push(("code_challenge", &challenge));
        params.push(("code_challenge_method", "S256"));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorization_endpoint, query)
}

/// Query parameters carried by the upstream redirect.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub usage_point_id: Option<String>,
    /// Any other query parameters; folded into the token object in
    /// exchange mode.
    pub extra: Vec<(String, String)>,
}

/// Consume the redirect callback and complete the waiting device request.
pub async fn complete(
    store: &dyn Store,
    config: &ProxyConfig,
    upstream: &dyn UpstreamClient,
    params: CallbackParams,
) -> Result<()> {
    if let Some(error) = params.error {
        return Err(OAuthError::UpstreamDenied {
            error,
            description: params.error_description.unwrap_or_default(),
        });
    }

    let (state, code) = match (&params.state, &params.code) {
        (Some(s), Some(c)) if !s.is_empty() && !c.is_empty() => (s.clone(), c.clone()),
        _ => {
            return Err(OAuthError::InvalidRequest(
                "Missing state or code in the request".to_string(),
            ));
        }
    };

    let record: StateRecord = match store.get(&state_key(&state)).await? {
        Some(value) => serde_json::from_value(value).map_err(|e| {
            OAuthError::Store(tollgate_store::Error::Malformed {
                key: state_key(&state),
                reason: e.to_string(),
            })
        })?,
        None => {
            return Err(OAuthError::InvalidState(
                "State parameter is not valid".to_string(),
            ));
        }
    };

    let session = device::lookup(store, &record.user_code)
        .await?
        .ok_or_else(|| OAuthError::InvalidRequest("user_code not found".to_string()))?;

    let result = match config.flow {
        FlowMode::DirectIssue => {
            issue_local_tokens(store, config, params.usage_point_id.as_deref()).await
        }
        FlowMode::Device => {
            exchange_code(store, config, upstream, &session, &record.user_code, &code, params.extra)
                .await
        }
    };
    let token_response = match result {
        Ok(token) => token,
        Err(e) => {
            // A failed exchange spends the state along with the session;
            // the human has to start over with a fresh code.
            if matches!(e, OAuthError::Upstream(_) | OAuthError::Network(_)) {
                store.delete(&state_key(&state)).await?;
            }
            return Err(e);
        }
    };

    device::save_request(
        store,
        &session.device_code,
        &DeviceRequest::complete(token_response),
        COMPLETE_TTL,
    )
    .await?;
    store.delete(&record.user_code).await?;
    store.delete(&state_key(&state)).await?;

    info!(client_id = %session.client_id, "Consent completed, device request ready");

    Ok(())
}

/// Direct-issue mode: mint an access/refresh pair bound to the usage
/// points named in the redirect, without touching the upstream token
/// endpoint.
async fn issue_local_tokens(
    store: &dyn Store,
    config: &ProxyConfig,
    usage_point_id: Option<&str>,
) -> Result<Value> {
    let usage_points = match usage_point_id {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => {
            return Err(OAuthError::InvalidRequest(
                "Missing usage_point_id in the request".to_string(),
            ));
        }
    };

    let access_token = mint_token(store, "access_token:").await?;
    store
        .put(
            &format!("access_token:{access_token}"),
            Value::String(usage_points.clone()),
            config.access_token_ttl,
        )
        .await?;

    let refresh_token = mint_token(store, "refresh_token:").await?;
    store
        .put(
            &format!("refresh_token:{refresh_token}"),
            Value::String(usage_points.clone()),
            config.refresh_token_ttl,
        )
        .await?;

    Ok(json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "Bearer",
        "expires_in": config.access_token_ttl.as_secs(),
        "usage_points_id": usage_points,
        "scope": "",
    }))
}

/// Exchange mode: trade the authorization code for the upstream's token
/// object. On a response without an access token the pending session and
/// device request are torn down so the device stops polling a request
/// that can never complete.
async fn exchange_code(
    store: &dyn Store,
    config: &ProxyConfig,
    upstream: &dyn UpstreamClient,
    session: &DeviceSession,
    user_code: &str,
    code: &str,
    extra: Vec<(String, String)>,
) -> Result<Value> {
    let mut params: Vec<(String, String)> = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), code.to_string()),
        ("client_id".to_string(), session.client_id.clone()),
    ];
    if let Some(redirect_uri) = &config.redirect_uri {
        params.push(("redirect_uri".to_string(), redirect_uri.clone()));
    }
    // The server's own secret wins over one the device supplied at begin.
    if let Some(secret) = config.client_secret.as_ref().or(session.client_secret.as_ref()) {
        params.push(("client_secret".to_string(), secret.clone()));
    }
    if config.pkce {
        params.push(("code_verifier".to_string(), session.pkce_verifier.clone()));
    }

    let response = match upstream.post_form(&config.token_endpoint, &params).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Token exchange unreachable, tearing down session");
            store.delete(user_code).await?;
            store.delete(&session.device_code).await?;
            return Err(e);
        }
    };

    let token = response.json_body().ok().filter(|t| t.get("access_token").is_some());
    let mut token = match token {
        Some(t) => t,
        None => {
            warn!(status = response.status, "Token exchange failed, tearing down session");
            store.delete(user_code).await?;
            store.delete(&session.device_code).await?;
            return Err(OAuthError::Upstream(response.body));
        }
    };

    // Carry any extra redirect parameters into the token object.
    if let Value::Object(map) = &mut token {
        for (key, value) in extra {
            if key != "state" && key != "code" {
                map.insert(key, Value::String(value));
            }
        }
    }

    Ok(token)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
