//! Cache backend abstraction and the in-memory implementation.

use crate::error::{Error, Result};
use crate::key::CacheKey;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Key → bytes store the engine writes cache entries through.
///
/// Keys are structural: a backend receives the [`CacheKey`] itself and
/// decides how to serialize it for its own addressing. The TTL is a
/// pass-through storage option; eviction policy is entirely the backend's
/// business.
pub trait CacheBackend: Send + Sync {
    fn get(
        &self,
        key: &CacheKey,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Drop every entry. Test and operations use only.
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// In-memory backend over a concurrent map, with operation counters.
///
/// Addresses entries by the key's canonical form. TTLs are accepted and
/// ignored; entries live until [`CacheBackend::clear`].
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<DashMap<String, Vec<u8>>>,
    gets: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `get` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Overwrite an entry directly, bypassing the engine. Test backdoor for
    /// planting known cache contents.
    pub fn plant(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.canonical()?, value);
        Ok(())
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let canonical = key
            .canonical()
            .map_err(|e| Error::BackendFailure(e.to_string()))?;
        match self.entries.get(&canonical) {
            Some(entry) => {
                debug!("✓ in-memory GET {} -> HIT", canonical);
                Ok(Some(entry.value().clone()))
            }
            None => {
                debug!("✓ in-memory GET {} -> MISS", canonical);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let canonical = key
            .canonical()
            .map_err(|e| Error::BackendFailure(e.to_string()))?;
        debug!("✓ in-memory PUT {} ({} bytes)", canonical, value.len());
        self.entries.insert(canonical, value);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        warn!("⚠ in-memory cache cleared ({} entries)", self.entries.len());
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FreshnessSignal;
    use crate::query::{CacheOptions, QueryKind, QueryOptions};
    use crate::value::Value;
    use crate::KeyBuilder;

    use crate::database::Row;
    use crate::record::{column_value, Record};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        updated_at: f64,
    }

    impl Record for Item {
        fn table() -> &'static str {
            "items"
        }

        fn columns() -> &'static [&'static str] {
            &["id", "updated_at"]
        }

        fn id(&self) -> Value {
            Value::Int(self.id)
        }

        fn timestamp(&self) -> Value {
            Value::Float(self.updated_at)
        }

        fn set_timestamp(&mut self, ts: Value) {
            if let Some(f) = ts.as_f64() {
                self.updated_at = f;
            }
        }

        fn from_row(row: &Row) -> crate::Result<Self> {
            Ok(Item {
                id: column_value(row, "id")?.as_i64().unwrap_or_default(),
                updated_at: column_value(row, "updated_at")?.as_f64().unwrap_or_default(),
            })
        }
    }

    fn key(count: u64) -> CacheKey {
        let shape = QueryOptions::new().shape_for::<Item>(QueryKind::FindAll);
        KeyBuilder::build(
            &shape,
            &FreshnessSignal::Set {
                max_timestamp: Some(Value::Float(1.0)),
                row_count: count,
            },
            &CacheOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let backend = InMemoryBackend::new();
        backend
            .put(&key(1), vec![1, 2, 3], None)
            .await
            .expect("Failed to put");
        let value = backend.get(&key(1)).await.expect("Failed to get");
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_distinct_entries() {
        let backend = InMemoryBackend::new();
        backend
            .put(&key(1), vec![1], None)
            .await
            .expect("Failed to put");
        backend
            .put(&key(2), vec![2], None)
            .await
            .expect("Failed to put");
        assert_eq!(backend.len(), 2);
        let value = backend.get(&key(2)).await.expect("Failed to get");
        assert_eq!(value, Some(vec![2]));
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = InMemoryBackend::new();
        backend
            .put(&key(1), vec![1], None)
            .await
            .expect("Failed to put");
        backend.clear().await.expect("Failed to clear");
        assert!(backend.is_empty());
        let value = backend.get(&key(1)).await.expect("Failed to get");
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_counters_track_operations() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.get_count(), 0);
        assert_eq!(backend.put_count(), 0);

        backend
            .put(&key(1), vec![1], None)
            .await
            .expect("Failed to put");
        let _ = backend.get(&key(1)).await.expect("Failed to get");
        let _ = backend.get(&key(2)).await.expect("Failed to get");

        assert_eq!(backend.put_count(), 1);
        assert_eq!(backend.get_count(), 2);
    }
}
