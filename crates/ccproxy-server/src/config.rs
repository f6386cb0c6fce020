use axum::http::HeaderName;
use ccproxy_cache::RedisConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream contact API
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Redis cache configuration
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.request_timeout_ms == 0 {
            return Err("server.request_timeout_ms must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Upstream validations
        self.upstream.base_url()?;
        self.upstream.tenant_header_name()?;
        if self.upstream.timeout_ms == 0 {
            return Err("upstream.timeout_ms must be > 0".into());
        }
        if self.upstream.timeout_ms >= self.server.request_timeout_ms {
            return Err(
                "upstream.timeout_ms must be < server.request_timeout_ms".into(),
            );
        }
        if self.upstream.max_body_bytes == 0 {
            return Err("upstream.max_body_bytes must be > 0".into());
        }
        // Redis validations
        if self.redis.url.trim().is_empty() {
            return Err("redis.url must not be empty".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whole-request timeout, including the upstream round trip
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long in-flight requests may drain after a shutdown signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout_ms() -> u64 {
    35_000
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// Upstream contact API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL every request is forwarded to; the inbound path is appended
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// Header carrying the tenant secret that scopes cache keys
    #[serde(default = "default_tenant_header")]
    pub tenant_header: String,
    /// Upstream request timeout in milliseconds
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest upstream body buffered for caching
    #[serde(default = "default_upstream_max_body")]
    pub max_body_bytes: usize,
}

fn default_upstream_base_url() -> String {
    "https://api2.autopilothq.com/v1".into()
}
fn default_tenant_header() -> String {
    "autopilotapikey".into()
}
fn default_upstream_timeout_ms() -> u64 {
    30_000
}
fn default_upstream_max_body() -> usize {
    10 * 1024 * 1024
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            tenant_header: default_tenant_header(),
            timeout_ms: default_upstream_timeout_ms(),
            max_body_bytes: default_upstream_max_body(),
        }
    }
}

impl UpstreamConfig {
    /// Parses `base_url`, accepting only absolute http(s) URLs with a host.
    pub fn base_url(&self) -> Result<Url, String> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| format!("upstream.base_url is not a valid URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("upstream.base_url must use http or https".into());
        }
        if url.host_str().is_none() {
            return Err("upstream.base_url must include a host".into());
        }
        Ok(url)
    }

    pub fn tenant_header_name(&self) -> Result<HeaderName, String> {
        HeaderName::from_bytes(self.tenant_header.trim().as_bytes())
            .map_err(|_| format!("upstream.tenant_header {:?} is not a valid header name", self.tenant_header))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("ccproxy.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., CCPROXY__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("CCPROXY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
