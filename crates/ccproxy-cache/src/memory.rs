//! In-memory cache store backed by `DashMap`.
//!
//! Used for tests and for running the proxy without Redis. Entries live until
//! [`CacheStore::invalidate`] is called; there is no eviction.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::traits::CacheStore;

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Vec<u8>>,
    closed: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.entries.insert(key.to_string(), value.to_vec());
        tracing::debug!(key = %key, bytes = value.len(), "cache set (memory)");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.ensure_open()?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn invalidate(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::debug!(dropped, "cache invalidated (memory)");
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.closed.store(true, Ordering::Release);
        self.entries.clear();
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
