//! Shared cache tier port.
//!
//! The shared tier is an optional durable store reachable from several pool
//! instances. Implementations live in answerpool-infra (SQLite).
//! Uses RPITIT (native async fn in traits, Rust 2024 edition), with
//! `BoxSharedCacheStore` providing dynamic dispatch via the usual
//! object-safe blanket-impl wrapper.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use answerpool_types::answer::CachedAnswer;
use answerpool_types::error::CacheStoreError;

/// An unexpired entry read back from the shared tier.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedEntry {
    pub answer: CachedAnswer,
    /// Time left before the entry expires.
    pub remaining_ttl: Duration,
}

/// Trait for the durable shared cache tier.
pub trait SharedCacheStore: Send + Sync {
    /// Fetch an entry. Expired entries must read as `None`.
    fn get(
        &self,
        fingerprint: &str,
    ) -> impl Future<Output = Result<Option<SharedEntry>, CacheStoreError>> + Send;

    /// Insert or overwrite an entry with the given time-to-live.
    fn set(
        &self,
        fingerprint: &str,
        answer: &CachedAnswer,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheStoreError>> + Send;

    /// Remove one entry. No-op if absent.
    fn delete(&self, fingerprint: &str) -> impl Future<Output = Result<(), CacheStoreError>> + Send;

    /// Remove every entry, returning how many were removed.
    fn clear(&self) -> impl Future<Output = Result<u64, CacheStoreError>> + Send;
}

/// Object-safe version of [`SharedCacheStore`] with boxed futures.
pub trait SharedCacheStoreDyn: Send + Sync {
    fn get_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SharedEntry>, CacheStoreError>> + Send + 'a>>;

    fn set_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
        answer: &'a CachedAnswer,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheStoreError>> + Send + 'a>>;

    fn delete_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheStoreError>> + Send + 'a>>;

    fn clear_boxed(&self) -> Pin<Box<dyn Future<Output = Result<u64, CacheStoreError>> + Send + '_>>;
}

impl<T: SharedCacheStore> SharedCacheStoreDyn for T {
    fn get_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SharedEntry>, CacheStoreError>> + Send + 'a>> {
        Box::pin(self.get(fingerprint))
    }

    fn set_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
        answer: &'a CachedAnswer,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheStoreError>> + Send + 'a>> {
        Box::pin(self.set(fingerprint, answer, ttl))
    }

    fn delete_boxed<'a>(
        &'a self,
        fingerprint: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheStoreError>> + Send + 'a>> {
        Box::pin(self.delete(fingerprint))
    }

    fn clear_boxed(&self) -> Pin<Box<dyn Future<Output = Result<u64, CacheStoreError>> + Send + '_>> {
        Box::pin(self.clear())
    }
}

/// Type-erased shared cache store.
pub struct BoxSharedCacheStore {
    inner: Box<dyn SharedCacheStoreDyn>,
}

impl BoxSharedCacheStore {
    pub fn new<T: SharedCacheStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn get(&self, fingerprint: &str) -> Result<Option<SharedEntry>, CacheStoreError> {
        self.inner.get_boxed(fingerprint).await
    }

    pub async fn set(
        &self,
        fingerprint: &str,
        answer: &CachedAnswer,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        self.inner.set_boxed(fingerprint, answer, ttl).await
    }

    pub async fn delete(&self, fingerprint: &str) -> Result<(), CacheStoreError> {
        self.inner.delete_boxed(fingerprint).await
    }

    pub async fn clear(&self) -> Result<u64, CacheStoreError> {
        self.inner.clear_boxed().await
    }
}
