//! Environment-driven configuration for the tollgate proxy.
//!
//! The deployment surface is a flat set of environment variables (usually
//! provided through a `.env` file): the proxy's own base URL, the upstream
//! authorization/token/credentials/data endpoints, the server's client
//! identity, and a handful of behavior switches. [`ProxyConfig::from_env`]
//! reads and validates them once at startup; handlers only ever see the
//! parsed struct.

mod error;

pub use error::{ConfigError, Result};

use std::time::Duration;

/// Lifetime of an access token issued by the proxy itself.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(12_600);

/// Lifetime of a refresh token issued by the proxy itself.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(4 * 365 * 24 * 60 * 60);

/// Default per-minute request limit for polling and data endpoints.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 5;

/// Default timeout applied to every outbound upstream call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the redirect callback turns a completed consent into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// The proxy mints its own access/refresh pair, bound to the usage
    /// points named in the redirect. The upstream server has already
    /// authenticated the user through its own UI and delegates only
    /// resource scoping to the proxy.
    DirectIssue,

    /// The proxy exchanges the authorization code against the upstream
    /// token endpoint and hands the upstream's token object to the device.
    Device,
}

impl FlowMode {
    /// Parse the `FLOW` variable. Only the literal `DEVICE`
    /// (case-insensitive) selects the exchange flow; anything else,
    /// including unset, means direct issue.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("device") => FlowMode::Device,
            _ => FlowMode::DirectIssue,
        }
    }
}

/// Parsed proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Public base URL of this proxy, used to build the verification URI.
    pub base_url: String,

    /// Per-minute request limit for rate-limited endpoints.
    pub requests_per_minute: u32,

    /// Upstream authorization endpoint the browser is redirected to.
    pub authorization_endpoint: String,

    /// Upstream token endpoint for the authorization-code exchange and the
    /// opaque token pass-through.
    pub token_endpoint: String,

    /// Endpoint for the proxy's own client-credentials grant. Only needed
    /// when the data proxy is used.
    pub credentials_endpoint: Option<String>,

    /// Base URL of the downstream data API.
    pub data_endpoint: Option<String>,

    /// The proxy's own client identity at the upstream server.
    pub client_id: Option<String>,

    /// Secret paired with `client_id`. Takes precedence over any secret a
    /// device supplied when its session was created.
    pub client_secret: Option<String>,

    /// Redirect URI registered with the upstream server, when it requires
    /// one on the exchange.
    pub redirect_uri: Option<String>,

    /// Optional consent duration forwarded to the authorization endpoint.
    pub duration: Option<String>,

    /// Whether to attach a PKCE challenge to the authorization redirect.
    pub pkce: bool,

    /// Minimum client version accepted, compared against the version
    /// embedded in the caller's user agent. `None` disables the gate.
    pub version_min: Option<String>,

    /// Redirect completion behavior.
    pub flow: FlowMode,

    /// Skip bearer validation on the data proxy.
    pub disable_data_auth: bool,

    /// Timeout for outbound calls to the upstream endpoints.
    pub request_timeout: Duration,

    /// Lifetime of proxy-issued access tokens.
    pub access_token_ttl: Duration,

    /// Lifetime of proxy-issued refresh tokens.
    pub refresh_token_ttl: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            authorization_endpoint: "https://auth.example.com/authorize".to_string(),
            token_endpoint: "https://auth.example.com/token".to_string(),
            credentials_endpoint: None,
            data_endpoint: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            duration: None,
            pkce: false,
            version_min: None,
            flow: FlowMode::DirectIssue,
            disable_data_auth: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            access_token_ttl: ACCESS_TOKEN_TTL,
            refresh_token_ttl: REFRESH_TOKEN_TTL,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset, matching how a commented-out
    /// `.env` line usually ends up as `VAR=`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let require = |name: &'static str| get(name).ok_or(ConfigError::MissingVar(name));

        let requests_per_minute = match get("LIMIT_REQUESTS_PER_MINUTE") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|e| ConfigError::InvalidVar {
                    name: "LIMIT_REQUESTS_PER_MINUTE",
                    reason: e.to_string(),
                })
                .and_then(|n| {
                    if n == 0 {
                        Err(ConfigError::InvalidVar {
                            name: "LIMIT_REQUESTS_PER_MINUTE",
                            reason: "limit must be at least 1".to_string(),
                        })
                    } else {
                        Ok(n)
                    }
                })?,
            None => DEFAULT_REQUESTS_PER_MINUTE,
        };

        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidVar {
                    name: "REQUEST_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            base_url: require("BASE_URL")?,
            requests_per_minute,
            authorization_endpoint: require("AUTHORIZATION_ENDPOINT")?,
            token_endpoint: require("TOKEN_ENDPOINT")?,
            credentials_endpoint: get("CREDENTIALS_ENDPOINT"),
            data_endpoint: get("DATA_ENDPOINT"),
            client_id: get("CLIENT_ID"),
            client_secret: get("CLIENT_SECRET"),
            redirect_uri: get("REDIRECT_URI"),
            duration: get("DURATION"),
            pkce: flag(get("PKCE").as_deref()),
            version_min: get("VERSION_MIN"),
            flow: FlowMode::parse(get("FLOW").as_deref()),
            disable_data_auth: flag(get("DISABLE_DATA_ENDPOINT_AUTH").as_deref()),
            request_timeout,
            access_token_ttl: ACCESS_TOKEN_TTL,
            refresh_token_ttl: REFRESH_TOKEN_TTL,
        })
    }

    /// Set the per-minute rate limit.
    pub fn with_requests_per_minute(mut self, limit: u32) -> Self {
        self.requests_per_minute = limit;
        self
    }

    /// Set the redirect completion behavior.
    pub fn with_flow(mut self, flow: FlowMode) -> Self {
        self.flow = flow;
        self
    }

    /// Set the proxy's own client identity.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the client secret.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Enable or disable PKCE on the authorization redirect.
    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.pkce = enabled;
        self
    }

    /// Set the minimum accepted client version.
    pub fn with_version_min(mut self, version: impl Into<String>) -> Self {
        self.version_min = Some(version.into());
        self
    }

    /// Set the downstream data API base URL.
    pub fn with_data_endpoint(mut self, url: impl Into<String>) -> Self {
        self.data_endpoint = Some(url.into());
        self
    }

    /// Set the client-credentials endpoint.
    pub fn with_credentials_endpoint(mut self, url: impl Into<String>) -> Self {
        self.credentials_endpoint = Some(url.into());
        self
    }

    /// Enable or disable bearer validation on the data proxy.
    pub fn with_disable_data_auth(mut self, disabled: bool) -> Self {
        self.disable_data_auth = disabled;
        self
    }
}

/// Parse a boolean-ish environment flag.
fn flag(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim),
        Some("1") | Some("true") | Some("TRUE") | Some("True") | Some("yes") | Some("on")
    )
}
