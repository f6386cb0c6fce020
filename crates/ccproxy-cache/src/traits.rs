//! The cache store contract the proxy handlers are written against.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CacheError;

/// A process-wide key/bytes store with a global clear.
///
/// Implementations must be safe to call from many concurrent requests
/// (`Send + Sync`). Keys are opaque strings; values are raw bytes with no
/// schema and no expiry.
///
/// # Example
///
/// ```ignore
/// use ccproxy_cache::{CacheKey, CacheStore, MemoryCache};
///
/// let cache = MemoryCache::new();
/// let key = CacheKey::derive("contact-1", "tenant-secret");
/// cache.store(key.as_str(), b"{}").await?;
/// assert_eq!(cache.load(key.as_str()).await?, Some(b"{}".to_vec()));
/// ```
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;

    /// Loads the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key was never stored (or was invalidated).
    /// A stored empty value comes back as `Ok(Some(vec![]))`.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Removes every key the store holds.
    async fn invalidate(&self) -> Result<(), CacheError>;

    /// Releases the underlying resources. Later operations fail with
    /// [`CacheError::Closed`].
    async fn close(&self) -> Result<(), CacheError>;

    /// Short backend name used in logs and readiness output.
    fn backend(&self) -> &'static str;
}

/// Shareable cache store handle.
pub type DynCacheStore = Arc<dyn CacheStore>;
