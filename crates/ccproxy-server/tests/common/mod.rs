//! Shared harness: a fake contact API, a proxy bound to an ephemeral port and
//! a cache store that always fails.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use ccproxy_server::{AppConfig, CacheError, CacheStore, DynCacheStore, ProxyState, build_app};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TENANT_HEADER: &str = "autopilotapikey";

/// A running axum server that can be stopped deterministically.
pub struct RunningServer {
    pub base: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub async fn start(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            base: format!("http://{addr}"),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Stops the server and waits until its listener is gone.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Canned upstream contact API. Answers every path; GET and POST replies are
/// configured separately.
pub struct FakeUpstream {
    server: RunningServer,
    hits: Arc<AtomicUsize>,
}

impl FakeUpstream {
    pub async fn start(get: (StatusCode, &'static str), post: (StatusCode, &'static str)) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = Router::new().fallback(move |method: Method, _body: Bytes| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = if method == Method::POST { post } else { get };
                (status, [(CONTENT_TYPE, "application/json")], body).into_response()
            }
        });

        Self {
            server: RunningServer::start(app).await,
            hits,
        }
    }

    /// Upstream that answers `200` with `body` to everything.
    pub async fn ok(body: &'static str) -> Self {
        Self::start((StatusCode::OK, body), (StatusCode::OK, body)).await
    }

    pub fn url(&self) -> &str {
        &self.server.base
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Makes the upstream unreachable.
    pub async fn stop(&mut self) {
        self.server.stop().await;
    }
}

pub fn proxy_config(upstream_url: &str) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.upstream.base_url = upstream_url.to_string();
    cfg.upstream.tenant_header = TENANT_HEADER.to_string();
    cfg.upstream.timeout_ms = 2_000;
    cfg
}

pub async fn start_proxy(upstream_url: &str, cache: DynCacheStore) -> RunningServer {
    start_proxy_with(&proxy_config(upstream_url), cache).await
}

pub async fn start_proxy_with(cfg: &AppConfig, cache: DynCacheStore) -> RunningServer {
    let state = ProxyState::new(cfg, cache).expect("proxy state");
    RunningServer::start(build_app(state, cfg)).await
}

/// Cache store whose backend is always down.
pub struct UnavailableCache;

#[async_trait]
impl CacheStore for UnavailableCache {
    async fn store(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn invalidate(&self) -> Result<(), CacheError> {
        Err(CacheError::connection("connection refused"))
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "unavailable"
    }
}

pub fn unavailable_cache() -> DynCacheStore {
    Arc::new(UnavailableCache)
}
