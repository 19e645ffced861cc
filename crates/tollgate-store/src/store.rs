//! The store capability trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// TTL given to a record created implicitly by [`Store::increment`].
///
/// Callers that care about the window length follow the increment with a
/// [`Store::touch`]; this default only bounds the record's life if they
/// never do.
pub const DEFAULT_INCREMENT_TTL: Duration = Duration::from_secs(600);

/// A key-value store where every record carries its own expiry deadline.
///
/// Expiry is part of the read contract: a record past its deadline is
/// indistinguishable from an absent one, whether or not the backend has
/// physically removed it yet. There are no multi-key operations — protocol
/// steps are sequences of independent single-key calls and must tolerate
/// other requests interleaving between them.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Upsert a record and reset its expiry deadline.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Fetch a live record. Expired records read as absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Add `delta` to an integer record, creating it (with
    /// [`DEFAULT_INCREMENT_TTL`]) when absent. Returns the new value.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Reset a record's expiry without changing its value.
    ///
    /// Returns `false` when the record is absent or already expired.
    async fn touch(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove a record. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Shared store handle for use across async contexts.
pub type SharedStore = Arc<dyn Store>;
