//! Fingerprint storage.
//!
//! [`CacheStore`] is the minimal key-value contract a backend implements.
//! [`EtagCache`] layers the tenant namespace and a round-trip timeout on top,
//! and is what the evaluator, assembler, and invalidation hook talk to.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::identity::{ResourceIdentity, cache_key};
use crate::options::CacheSettings;

/// Errors surfaced by a cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A string key-value store shared by concurrent requests.
///
/// Writes are last-writer-wins. No TTLs: entries leave through
/// [`delete`](Self::delete) or are overwritten.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Process-local store, for single-node deployments and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Tenant-scoped fingerprint cache over any [`CacheStore`].
///
/// Every round-trip is bounded by the configured timeout. Reads degrade to a
/// miss and writes are best-effort: neither ever fails the request.
#[derive(Clone)]
pub struct EtagCache {
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
}

impl EtagCache {
    pub fn new(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self { store, settings }
    }

    pub fn tenant(&self) -> &str {
        &self.settings.tenant
    }

    /// Stored hash for the identity's lookup key, or `None` on miss or failure.
    pub async fn lookup(&self, identity: &ResourceIdentity) -> Option<String> {
        let key = identity.lookup_key(self.tenant())?;
        match self.bounded(self.store.get(&key)).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(key = %key, error = %e, "etag lookup failed, treating as miss");
                None
            }
        }
    }

    /// Writes `hash` under every key of the identity (id and slug).
    ///
    /// When both handles are known the id entry also records its slug.
    pub async fn remember(&self, identity: &ResourceIdentity, hash: &str) {
        for key in identity.cache_keys(self.tenant()) {
            self.write(&key, hash).await;
        }
        if let (Some(link), Some(slug)) = (
            identity.slug_link_key(self.tenant()),
            identity.slug.as_deref(),
        ) {
            self.write(&link, slug).await;
        }
    }

    /// Deletes every key of the identity (id and slug).
    ///
    /// A slug the identity does not carry is resolved through the link the
    /// id entry recorded, so reporting `(type, id)` alone is enough.
    pub async fn forget(&self, identity: &ResourceIdentity) {
        let mut keys = identity.cache_keys(self.tenant());
        if let Some(link) = identity.slug_link_key(self.tenant()) {
            if let Some(slug) = self.linked_slug(&link).await {
                if identity.slug.as_deref() != Some(slug.as_str()) {
                    keys.push(cache_key(self.tenant(), &identity.kind, &slug));
                }
            }
            keys.push(link);
        }
        for key in keys {
            match self.bounded(self.store.delete(&key)).await {
                Ok(()) => debug!(key = %key, "etag invalidated"),
                Err(e) => warn!(key = %key, error = %e, "etag invalidation failed"),
            }
        }
    }

    async fn write(&self, key: &str, value: &str) {
        match self.bounded(self.store.set(key, value)).await {
            Ok(()) => debug!(key = %key, "etag stored"),
            Err(e) => warn!(key = %key, error = %e, "etag write failed"),
        }
    }

    async fn linked_slug(&self, link: &str) -> Option<String> {
        match self.bounded(self.store.get(link)).await {
            Ok(slug) => slug.filter(|slug| !slug.is_empty()),
            Err(e) => {
                warn!(key = %link, error = %e, "slug link lookup failed");
                None
            }
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        let limit = self.settings.store_timeout;
        tokio::time::timeout(limit, op)
            .await
            .map_err(|_| StoreError::Timeout(limit))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl CacheStore for SlowStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some("late".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    fn post_42() -> ResourceIdentity {
        ResourceIdentity::new("post").with_id("42").with_slug("hello")
    }

    #[tokio::test]
    async fn memory_round_trip() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remember_writes_id_and_slug_keys() {
        let store = MemoryStore::new();
        let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new("site-1"));
        cache.remember(&post_42(), "abc").await;

        assert_eq!(
            store.get("site-1:etags:posts/42").await.unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(
            store.get("site-1:etags:posts/hello").await.unwrap().as_deref(),
            Some("abc")
        );

        assert_eq!(
            store.get("site-1:etags:posts/42#slug").await.unwrap().as_deref(),
            Some("hello")
        );

        cache.forget(&post_42()).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn forget_by_id_resolves_the_slug() {
        let store = MemoryStore::new();
        let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new("site-1"));
        cache.remember(&post_42(), "abc").await;

        cache.forget(&ResourceIdentity::new("post").with_id("42")).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn forget_after_slug_rename_drops_the_old_slug() {
        let store = MemoryStore::new();
        let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new("site-1"));
        cache.remember(&post_42(), "abc").await;

        let renamed = ResourceIdentity::new("post").with_id("42").with_slug("hello-again");
        cache.forget(&renamed).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn id_only_identity_writes_no_link() {
        let store = MemoryStore::new();
        let cache = EtagCache::new(Arc::new(store.clone()), CacheSettings::new("site-1"));
        cache.remember(&ResourceIdentity::new("post").with_id("7"), "abc").await;
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn tenants_do_not_collide() {
        let store = Arc::new(MemoryStore::new());
        let a = EtagCache::new(store.clone(), CacheSettings::new("a"));
        let b = EtagCache::new(store.clone(), CacheSettings::new("b"));
        a.remember(&post_42(), "from-a").await;
        assert_eq!(b.lookup(&post_42()).await, None);
        assert_eq!(a.lookup(&post_42()).await.as_deref(), Some("from-a"));
    }

    #[tokio::test]
    async fn store_failure_is_a_miss() {
        let cache = EtagCache::new(Arc::new(BrokenStore), CacheSettings::new("t"));
        assert_eq!(cache.lookup(&post_42()).await, None);
        cache.remember(&post_42(), "abc").await;
        cache.forget(&post_42()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let settings = CacheSettings::new("t").with_store_timeout(Duration::from_millis(10));
        let cache = EtagCache::new(Arc::new(SlowStore), settings);
        assert_eq!(cache.lookup(&post_42()).await, None);
    }
}
