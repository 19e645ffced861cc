//! Upstream credential manager: the proxy's own service token.
//!
//! The data forwarder calls the downstream API with a client-credentials
//! token belonging to the proxy, not the device. The token is cached in
//! the store under a fixed key for its upstream-reported lifetime and
//! renewed on demand.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tollgate_config::ProxyConfig;
use tollgate_store::SharedStore;

use crate::error::{OAuthError, Result};
use crate::upstream::UpstreamClient;

/// Store key of the cached service token.
pub const SERVICE_TOKEN_KEY: &str = "client_credentials";

/// Tokens with this little life left are not worth caching: they would
/// expire before the next request could reuse them.
const MIN_CACHEABLE_LIFETIME: u64 = 180;

/// The upstream's client-credentials token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceToken {
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub access_token: String,
    pub expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl ServiceToken {
    /// Value for an `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Obtains and caches the proxy's service token.
#[derive(Debug, Clone)]
pub struct CredentialManager {
    store: SharedStore,
    config: Arc<ProxyConfig>,
    upstream: Arc<dyn UpstreamClient>,
}

impl CredentialManager {
    pub fn new(store: SharedStore, config: Arc<ProxyConfig>, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self {
            store,
            config,
            upstream,
        }
    }

    /// Get a service token, from cache when one is live.
    pub async fn service_token(&self) -> Result<ServiceToken> {
        if let Some(value) = self.store.get(SERVICE_TOKEN_KEY).await? {
            if let Ok(token) = serde_json::from_value::<ServiceToken>(value) {
                return Ok(token);
            }
            // Unparsable cache entry: fall through and renew.
            warn!("Cached service token is malformed, renewing");
        }
        self.renew().await
    }

    /// Fetch a fresh token from the credentials endpoint, caching it when
    /// its lifetime clears the renewal-thrash guard.
    pub async fn renew(&self) -> Result<ServiceToken> {
        let endpoint = self
            .config
            .credentials_endpoint
            .as_deref()
            .ok_or_else(|| OAuthError::Config("CREDENTIALS_ENDPOINT is not set".to_string()))?;
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or_else(|| OAuthError::Config("CLIENT_ID is not set".to_string()))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or_else(|| OAuthError::Config("CLIENT_SECRET is not set".to_string()))?;

        let params = [
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), client_id.to_string()),
            ("client_secret".to_string(), client_secret.to_string()),
        ];
        let response = self.upstream.post_form(endpoint, &params).await?;

        let value = response.json_body()?;
        if value.get("access_token").is_none() || value.get("expires_in").is_none() {
            return Err(OAuthError::Upstream(response.body));
        }
        let token: ServiceToken = serde_json::from_value(value.clone())
            .map_err(|_| OAuthError::Upstream(response.body))?;

        if token.expires_in > MIN_CACHEABLE_LIFETIME {
            self.store
                .put(
                    SERVICE_TOKEN_KEY,
                    value,
                    Duration::from_secs(token.expires_in),
                )
                .await?;
        }

        info!(expires_in = token.expires_in, "Service token renewed");
        Ok(token)
    }
}
