//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable '{0}'")]
    MissingVar(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for environment variable '{name}': {reason}")]
    InvalidVar { name: &'static str, reason: String },
}
