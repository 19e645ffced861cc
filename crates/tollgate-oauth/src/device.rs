//! Device session registry: device/user code pairing and status.
//!
//! `begin` is the device's entry point into the flow. It leaves two records
//! behind: the user session (keyed by the normalized user code, read by the
//! browser steps) and the pending device request (keyed by the device code,
//! read by the polling endpoint). Both expire in five minutes — a device
//! that never gets its code entered simply ages out.

use std::time::Duration;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tollgate_config::ProxyConfig;
use tollgate_store::Store;

use crate::error::{OAuthError, Result};

/// How long an unapproved device code and its user session live.
pub const PENDING_TTL: Duration = Duration::from_secs(300);

/// How long a completed device request waits to be polled before expiring.
pub const COMPLETE_TTL: Duration = Duration::from_secs(120);

/// User-code alphabet. `I` and `O` are left out so codes survive being
/// read off a TV screen and typed by hand.
const USER_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Everything captured from the device when it requested a code, read back
/// by the browser-side steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub device_code: String,
    pub pkce_verifier: String,
}

/// Progress of one device authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Pending,
    Complete,
}

/// The record the device polls: pending until the redirect completes, then
/// complete with the token object attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub status: DeviceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_response: Option<Value>,
}

impl DeviceRequest {
    pub fn pending() -> Self {
        Self {
            status: DeviceStatus::Pending,
            token_response: None,
        }
    }

    pub fn complete(token_response: Value) -> Self {
        Self {
            status: DeviceStatus::Complete,
            token_response: Some(token_response),
        }
    }
}

/// What the device gets back from `begin`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
}

/// Generate `n` random bytes as lowercase hex.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generate a human-transcribable code: two four-letter groups.
fn random_user_code() -> String {
    let mut rng = rand::rng();
    let mut group = || -> String {
        (0..4)
            .map(|_| USER_CODE_ALPHABET[rng.random_range(0..USER_CODE_ALPHABET.len())] as char)
            .collect()
    };
    format!("{}-{}", group(), group())
}

/// Canonical form of a user code: hyphens stripped, upper-cased. Applied
/// identically when storing and when looking up, so users can type the
/// code with or without the hyphen and in any case.
pub fn normalize_user_code(input: &str) -> String {
    input.replace('-', "").to_ascii_uppercase()
}

/// Start a device authorization attempt.
pub async fn begin(
    store: &dyn Store,
    config: &ProxyConfig,
    client_id: Option<&str>,
    client_secret: Option<&str>,
    scope: Option<&str>,
) -> Result<DeviceGrant> {
    let client_id = match client_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(OAuthError::InvalidRequest("Missing client_id".to_string())),
    };

    let device_code = random_hex(32);
    let pkce_verifier = random_hex(32);
    let user_code = random_user_code();

    let session = DeviceSession {
        client_id,
        client_secret: client_secret.map(str::to_string),
        scope: scope.map(str::to_string),
        device_code: device_code.clone(),
        pkce_verifier,
    };

    save_session(store, &normalize_user_code(&user_code), &session).await?;
    save_request(store, &device_code, &DeviceRequest::pending(), PENDING_TTL).await?;

    tracing::info!(user_code = %user_code, "Device authorization started");

    Ok(DeviceGrant {
        device_code,
        user_code,
        verification_uri: format!("{}/device", config.base_url),
        expires_in: PENDING_TTL.as_secs(),
        interval: poll_interval(config.requests_per_minute),
    })
}

/// Suggested seconds between polls, derived from the rate limit so a
/// well-behaved device never trips it.
fn poll_interval(per_minute: u32) -> u64 {
    (60.0 / f64::from(per_minute.max(1))).round() as u64
}

/// Fetch the session for a (normalized) user code.
pub async fn lookup(store: &dyn Store, user_code: &str) -> Result<Option<DeviceSession>> {
    match store.get(user_code).await? {
        Some(value) => Ok(Some(decode(user_code, value)?)),
        None => Ok(None),
    }
}

pub(crate) async fn save_session(
    store: &dyn Store,
    user_code: &str,
    session: &DeviceSession,
) -> Result<()> {
    let value = serde_json::to_value(session)
        .map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
    store.put(user_code, value, PENDING_TTL).await?;
    Ok(())
}

pub(crate) async fn load_request(
    store: &dyn Store,
    device_code: &str,
) -> Result<Option<DeviceRequest>> {
    match store.get(device_code).await? {
        Some(value) => Ok(Some(decode(device_code, value)?)),
        None => Ok(None),
    }
}

pub(crate) async fn save_request(
    store: &dyn Store,
    device_code: &str,
    request: &DeviceRequest,
    ttl: Duration,
) -> Result<()> {
    let value = serde_json::to_value(request)
        .map_err(|e| OAuthError::InvalidRequest(e.to_string()))?;
    store.put(device_code, value, ttl).await?;
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        OAuthError::Store(tollgate_store::Error::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}
