//! Error types for store operations.

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a store backend.
///
/// The in-memory backend never fails; external backends surface their
/// transport and encoding failures through these variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend could not be reached or rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored value could not be decoded as the expected shape.
    #[error("malformed record under '{key}': {reason}")]
    Malformed { key: String, reason: String },
}
