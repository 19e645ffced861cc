//! Error types for the device-grant protocol.
//!
//! Every variant corresponds to a wire-visible outcome: the OAuth error
//! code (and, on the data path, the HTTP status) is part of the protocol,
//! not a presentation detail, so it lives here rather than in the server
//! crate.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while driving the device-grant flow.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Missing or malformed client input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown, expired, or already-delivered device code.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// The user has not completed the browser step yet.
    #[error("authorization pending")]
    AuthorizationPending,

    /// The caller exceeded its per-minute request budget.
    #[error("slow down")]
    SlowDown,

    /// A grant type this proxy does not serve.
    #[error("unsupported grant type '{0}'")]
    UnsupportedGrantType(String),

    /// CSRF state missing, expired, or already consumed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The caller's client version is below the configured minimum.
    #[error("client version too old, please update")]
    VersionMismatch,

    /// Bearer validation failed on the data path. Carries the HTTP status
    /// the route reports, which varies by failure point.
    #[error("unauthorized: {description}")]
    Unauthorized { description: String, status: u16 },

    /// The upstream authorization server redirected back with an error.
    /// Surfaced verbatim to the user.
    #[error("{error}: {description}")]
    UpstreamDenied { error: String, description: String },

    /// The upstream returned a response the flow cannot proceed with
    /// (e.g. a token response without an access token). The raw body is
    /// kept for diagnosis.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Transport-level failure talking to an upstream endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// Store backend failure.
    #[error("store error: {0}")]
    Store(#[from] tollgate_store::Error),

    /// Required configuration is absent for the requested operation.
    #[error("config error: {0}")]
    Config(String),
}

impl OAuthError {
    /// The OAuth error code reported on JSON responses.
    pub fn error_code(&self) -> &str {
        match self {
            OAuthError::InvalidRequest(_) | OAuthError::InvalidState(_) => "invalid_request",
            OAuthError::InvalidGrant(_) => "invalid_grant",
            OAuthError::AuthorizationPending => "authorization_pending",
            OAuthError::SlowDown => "slow_down",
            OAuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuthError::VersionMismatch => "version_mismatch",
            OAuthError::Unauthorized { .. } => "Unauthorized",
            OAuthError::UpstreamDenied { error, .. } => error,
            OAuthError::Upstream(_) | OAuthError::Network(_) => "invalid_request",
            OAuthError::Store(_) | OAuthError::Config(_) => "server_error",
        }
    }

    /// Optional human-readable detail accompanying the error code.
    pub fn error_description(&self) -> Option<String> {
        match self {
            OAuthError::InvalidRequest(msg)
            | OAuthError::InvalidGrant(msg)
            | OAuthError::InvalidState(msg)
            | OAuthError::Upstream(msg) => Some(msg.clone()),
            OAuthError::UnsupportedGrantType(grant) => Some(format!(
                "Only '{}' and refresh_token are supported, not '{grant}'",
                crate::token::DEVICE_CODE_GRANT
            )),
            OAuthError::VersionMismatch => {
                Some("Your client version is too old, please update".to_string())
            }
            OAuthError::Unauthorized { description, .. } => Some(description.clone()),
            OAuthError::UpstreamDenied { description, .. } => Some(description.clone()),
            OAuthError::Network(msg) => Some(msg.clone()),
            OAuthError::AuthorizationPending | OAuthError::SlowDown => None,
            OAuthError::Store(_) | OAuthError::Config(_) => None,
        }
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}
