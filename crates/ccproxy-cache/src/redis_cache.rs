//! Redis cache store backed by a `deadpool-redis` connection pool.
//!
//! ## Commands
//!
//! | Operation    | Redis command |
//! |--------------|---------------|
//! | `store`      | `SET`         |
//! | `load`       | `GET`         |
//! | `invalidate` | `FLUSHDB`     |
//!
//! The pool size bounds the number of cache commands in flight. Callers beyond
//! that bound wait for a connection (up to `timeout_ms`) instead of failing
//! straight away.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::traits::CacheStore;

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    4
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Cache store that keeps entries in a Redis database.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    /// Creates the connection pool and verifies the server answers `PING`.
    ///
    /// A proxy without its cache is not started, so any failure here is
    /// returned to the caller instead of degrading.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        tracing::info!(url = %config.url, pool_size = config.pool_size, "Connecting to Redis");

        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = Config::from_url(config.url.clone());
        redis_config.pool = Some(pool_config);

        let pool = redis_config.create_pool(Some(Runtime::Tokio1))?;
        let cache = Self { pool };
        cache.ping().await?;

        tracing::info!("Connected to Redis");
        Ok(cache)
    }

    /// Round-trips a `PING` through a pooled connection.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        conn.set::<_, _, ()>(key, value).await?;
        tracing::debug!(key = %key, bytes = value.len(), "cache set (redis)");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.get().await?;
        let value = conn.get::<_, Option<Vec<u8>>>(key).await?;
        Ok(value)
    }

    async fn invalidate(&self) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        let () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        tracing::debug!("cache invalidated (redis)");
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.pool.close();
        tracing::info!("Redis pool closed");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.timeout_ms, 5000);
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        let config = RedisConfig {
            // Port 1 is reserved and never has a Redis server behind it.
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 500,
        };

        assert!(RedisCache::connect(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not a redis url".to_string(),
            ..RedisConfig::default()
        };

        assert!(RedisCache::connect(&config).await.is_err());
    }
}
