use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    error_handling::HandleErrorLayer,
    http::{HeaderName, StatusCode},
    middleware,
    routing::{any, get},
};
use ccproxy_cache::{DynCacheStore, RedisCache};
use tower::{BoxError, ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    config::AppConfig, contact, gateway::Gateway, handlers, middleware as app_middleware,
};

/// State shared by every request handler.
///
/// The cache handle is created once by the server builder and shared by
/// reference; handlers never own it.
#[derive(Clone)]
pub struct ProxyState {
    pub cache: DynCacheStore,
    pub gateway: Gateway,
    pub tenant_header: HeaderName,
    /// Largest upstream body buffered for caching
    pub max_body_bytes: usize,
}

impl ProxyState {
    pub fn new(cfg: &AppConfig, cache: DynCacheStore) -> anyhow::Result<Self> {
        let gateway = Gateway::new(&cfg.upstream)
            .context("could not create upstream gateway")?
            .with_request_body_limit(cfg.server.body_limit_bytes);
        let tenant_header = cfg
            .upstream
            .tenant_header_name()
            .map_err(anyhow::Error::msg)?;

        Ok(Self {
            cache,
            gateway,
            tenant_header,
            max_body_bytes: cfg.upstream.max_body_bytes,
        })
    }
}

pub fn build_app(state: ProxyState, cfg: &AppConfig) -> Router {
    Router::new()
        // Health endpoints
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Contact API; handlers reject the wrong method with 404
        .route("/contact", any(contact::create_contact))
        .route("/contact/{id}", any(contact::get_contact))
        .fallback(handlers::not_found)
        // Middleware stack (outermost last: request id -> trace -> access log -> timeout -> body limit)
        .layer(RequestBodyLimitLayer::new(cfg.server.body_limit_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .layer(TimeoutLayer::new(cfg.request_timeout())),
        )
        .layer(middleware::from_fn(app_middleware::access_log))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let req_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri().path(),
                    request_id = %req_id
                )
            }),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .with_state(state)
}

/// The request deadline passed before the upstream answered: a gateway
/// failure, not a client one.
async fn handle_timeout(err: BoxError) -> (StatusCode, &'static str) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::error!("request deadline elapsed before upstream answered");
        (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout")
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

pub struct ServerBuilder {
    config: AppConfig,
    cache: Option<DynCacheStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            cache: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Uses the given cache store instead of connecting to Redis.
    pub fn with_cache(mut self, cache: DynCacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Connects the cache and validates the upstream target.
    ///
    /// Both are startup requirements: there is no degraded mode without a
    /// cache or without a valid upstream.
    pub async fn build(self) -> anyhow::Result<ProxyServer> {
        let cache: DynCacheStore = match self.cache {
            Some(cache) => cache,
            None => Arc::new(
                RedisCache::connect(&self.config.redis)
                    .await
                    .context("could not connect to redis")?,
            ),
        };

        let state = ProxyState::new(&self.config, cache.clone())?;
        let app = build_app(state, &self.config);

        Ok(ProxyServer {
            addr: self.config.addr(),
            app,
            cache,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }
}

pub struct ProxyServer {
    addr: SocketAddr,
    app: Router,
    cache: DynCacheStore,
    shutdown_timeout: Duration,
}

impl ProxyServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Serves until a shutdown signal arrives, lets in-flight requests drain
    /// for at most the shutdown timeout, then closes the cache.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("Caching contact proxy listening on {}", self.addr);

        let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
        let serve = axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        })
        .into_future();

        let grace = self.shutdown_timeout;
        let drain_deadline = async move {
            match signal_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = serve => result?,
            _ = drain_deadline => {
                tracing::warn!(grace_secs = grace.as_secs(), "graceful shutdown window elapsed, dropping in-flight requests");
            }
        }

        if let Err(e) = self.cache.close().await {
            tracing::warn!(error = %e, "failed to close cache");
        }
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
