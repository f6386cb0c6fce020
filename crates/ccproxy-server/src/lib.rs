pub mod config;
pub mod contact;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ServerConfig, UpstreamConfig};
pub use gateway::{Gateway, GatewayError, UpstreamResponse};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{ProxyServer, ProxyState, ServerBuilder, build_app};

pub use ccproxy_cache::{
    CacheError, CacheKey, CacheStore, DynCacheStore, MemoryCache, RedisCache, RedisConfig,
};
