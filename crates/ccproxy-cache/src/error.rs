//! Cache error types.
//!
//! None of these are fatal to a proxied request: the handlers log them and
//! fall back to the upstream API. Only [`RedisCache::connect`] surfaces them
//! as startup failures.
//!
//! [`RedisCache::connect`]: crate::RedisCache::connect

/// Errors that can occur while talking to a cache backend.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached or no connection was available.
    #[error("Cache connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The backend was reached but rejected or failed the command.
    #[error("Cache command error: {message}")]
    Command {
        /// Description of the command failure.
        message: String,
    },

    /// The store has been closed and no longer accepts operations.
    #[error("Cache store is closed")]
    Closed,
}

impl CacheError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Command` error.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Returns `true` if the store was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            Self::connection(err.to_string())
        } else {
            Self::command(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Closed => Self::Closed,
            other => Self::connection(other.to_string()),
        }
    }
}

impl From<deadpool_redis::CreatePoolError> for CacheError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        Self::connection(format!("failed to create Redis pool: {err}"))
    }
}
