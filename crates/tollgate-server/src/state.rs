//! Application state shared across handlers.

use std::sync::Arc;

use tollgate_config::ProxyConfig;
use tollgate_oauth::{CredentialManager, RateLimiter, UpstreamClient};
use tollgate_store::SharedStore;

/// Application state shared across all handlers.
///
/// Everything in here is cheaply cloneable; handlers never hold protocol
/// records between requests — those live in the store.
#[derive(Clone)]
pub struct AppState {
    /// Parsed proxy configuration.
    pub config: Arc<ProxyConfig>,

    /// The expiring record store.
    pub store: SharedStore,

    /// Fixed-window request limiter over the store.
    pub limiter: RateLimiter,

    /// Outbound client for the upstream endpoints.
    pub upstream: Arc<dyn UpstreamClient>,

    /// The proxy's own service-token cache.
    pub credentials: CredentialManager,
}

impl AppState {
    /// Assemble state from its parts.
    pub fn new(config: ProxyConfig, store: SharedStore, upstream: Arc<dyn UpstreamClient>) -> Self {
        let config = Arc::new(config);
        let limiter = RateLimiter::new(store.clone(), config.requests_per_minute);
        let credentials = CredentialManager::new(store.clone(), config.clone(), upstream.clone());

        Self {
            config,
            store,
            limiter,
            upstream,
            credentials,
        }
    }
}
