//! # ccproxy-cache
//!
//! Cache layer for the ccproxy caching reverse proxy.
//!
//! ## Overview
//!
//! - [`CacheStore`]: the contract every backend implements (store, load,
//!   invalidate-all, close).
//! - [`CacheKey`]: tenant-scoped keys, HMAC-SHA256 of the entity identifier
//!   keyed with the tenant secret.
//! - [`RedisCache`]: production backend on a `deadpool-redis` pool.
//! - [`MemoryCache`]: in-process backend for tests and local runs.
//!
//! ## Example
//!
//! ```ignore
//! use ccproxy_cache::{CacheKey, CacheStore, RedisCache, RedisConfig};
//!
//! let cache = RedisCache::connect(&RedisConfig::default()).await?;
//! let key = CacheKey::derive("contact-1", "tenant-secret");
//!
//! if cache.load(key.as_str()).await?.is_none() {
//!     cache.store(key.as_str(), br#"{"contact_id":"contact-1"}"#).await?;
//! }
//! ```

mod error;
mod key;
mod memory;
mod redis_cache;
mod traits;

pub use error::CacheError;
pub use key::CacheKey;
pub use memory::MemoryCache;
pub use redis_cache::{RedisCache, RedisConfig};
pub use traits::{CacheStore, DynCacheStore};
