//! In-memory store backend with lazy expiry and a background reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::{DEFAULT_INCREMENT_TTL, Store};

/// A record and its absolute expiry deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process store backend.
///
/// Reads honor expiry lazily: a dead entry is reported absent even before
/// the reaper sweeps it. [`MemoryStore::spawn_reaper`] keeps the map from
/// accumulating dead entries under abandonment-heavy workloads (device
/// codes that are never completed, rate buckets from past minutes).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the store holds no live records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Spawn a background task that sweeps expired entries on an interval.
    ///
    /// The task runs until the returned handle is aborted or the runtime
    /// shuts down.
    pub fn spawn_reaper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = store.cleanup_expired().await;
                if swept > 0 {
                    debug!(swept, "Reaped expired store entries");
                }
            }
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let current = entry.value.as_i64().ok_or_else(|| Error::Malformed {
                    key: key.to_string(),
                    reason: "increment on a non-integer record".to_string(),
                })?;
                let next = current + delta;
                entry.value = Value::from(next);
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::from(delta),
                        expires_at: now + DEFAULT_INCREMENT_TTL,
                    },
                );
                Ok(delta)
            }
        }
    }

    async fn touch(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("k", json!({"a": 1}), Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("k").await.unwrap().unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_reads_as_absent_before_sweep() {
        let store = MemoryStore::new();
        store
            .put("k", json!("v"), Duration::from_millis(20))
            .await
            .unwrap();

        sleep(Duration::from_millis(50)).await;

        // Not swept yet, but the read contract hides it
        assert!(store.get("k").await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_put_resets_expiry() {
        let store = MemoryStore::new();
        store
            .put("k", json!(1), Duration::from_millis(30))
            .await
            .unwrap();

        sleep(Duration::from_millis(20)).await;
        store
            .put("k", json!(2), Duration::from_millis(60))
            .await
            .unwrap();
        sleep(Duration::from_millis(30)).await;

        // Past the original deadline, within the refreshed one
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_increment_creates_then_counts() {
        let store = MemoryStore::new();
        assert_eq!(store.increment("counter", 1).await.unwrap(), 1);
        assert_eq!(store.increment("counter", 1).await.unwrap(), 2);
        assert_eq!(store.increment("counter", 3).await.unwrap(), 5);
        assert_eq!(store.get("counter").await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn test_increment_on_expired_record_restarts() {
        let store = MemoryStore::new();
        store
            .put("counter", json!(10), Duration::from_millis(10))
            .await
            .unwrap();
        sleep(Duration::from_millis(30)).await;

        assert_eq!(store.increment("counter", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_non_integer_fails() {
        let store = MemoryStore::new();
        store
            .put("k", json!("text"), Duration::from_secs(60))
            .await
            .unwrap();

        let err = store.increment("k", 1).await.unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_touch_extends_life() {
        let store = MemoryStore::new();
        store
            .put("k", json!(1), Duration::from_millis(30))
            .await
            .unwrap();

        assert!(store.touch("k", Duration::from_millis(100)).await.unwrap());
        sleep(Duration::from_millis(50)).await;

        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_missing_or_expired_is_false() {
        let store = MemoryStore::new();
        assert!(!store.touch("nope", Duration::from_secs(1)).await.unwrap());

        store
            .put("k", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        sleep(Duration::from_millis(30)).await;
        assert!(!store.touch("k", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store
            .put("k", json!(1), Duration::from_secs(60))
            .await
            .unwrap();

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());

        // Deleting again is fine
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_expired_counts() {
        let store = MemoryStore::new();
        store
            .put("a", json!(1), Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put("b", json!(2), Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put("c", json!(3), Duration::from_secs(60))
            .await
            .unwrap();

        sleep(Duration::from_millis(30)).await;

        assert_eq!(store.cleanup_expired().await, 2);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reaper_sweeps() {
        let store = MemoryStore::new();
        store
            .put("k", json!(1), Duration::from_millis(10))
            .await
            .unwrap();

        let handle = store.spawn_reaper(Duration::from_millis(20));
        sleep(Duration::from_millis(60)).await;
        handle.abort();

        let entries = store.entries.read().await;
        assert!(entries.is_empty());
    }
}
