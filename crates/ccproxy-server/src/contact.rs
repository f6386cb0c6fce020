//! Contact handlers: read-through caching for `GET /contact/{id}` and
//! write-invalidate for `POST /contact`.
//!
//! Cache failures never fail a request. A failed load is a miss, a failed
//! store or invalidate is logged and dropped. Upstream failures always reach
//! the client as `502 Bad Gateway`.

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode,
        header::{ACCEPT_ENCODING, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use ccproxy_cache::{CacheKey, CacheStore};
use tracing::{info, warn};

use crate::gateway::UpstreamResponse;
use crate::handlers::not_found;
use crate::server::ProxyState;

/// `GET /contact/{id}`: serve from cache, otherwise forward and cache a `200`.
pub async fn get_contact(State(state): State<ProxyState>, mut request: Request<Body>) -> Response {
    if request.method() != Method::GET {
        return not_found().await;
    }
    let Some(id_bytes) = contact_id_bytes(request.uri().path()) else {
        return not_found().await;
    };
    let contact_id = String::from_utf8_lossy(&id_bytes).into_owned();

    let key = CacheKey::derive(
        &id_bytes,
        tenant_secret(request.headers(), &state.tenant_header),
    );

    if let Some(contact) = load(state.cache.as_ref(), &key).await {
        info!(contact_id = %contact_id, "loading contact from cache");
        let mut response = Response::new(Body::from(contact));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        return response;
    }

    // Cached bytes are served without Content-Encoding, so they must be stored
    // as identity-encoded.
    request.headers_mut().remove(ACCEPT_ENCODING);

    info!(contact_id = %contact_id, upstream = %state.gateway.base_url(), "forwarding contact read upstream");
    let cache = state.cache.clone();
    let max_body_bytes = state.max_body_bytes;

    state
        .gateway
        .forward_with(request, move |mut response: UpstreamResponse| async move {
            if response.status != StatusCode::OK {
                return Ok(response);
            }
            if response
                .content_length()
                .is_some_and(|len| len > max_body_bytes as u64)
            {
                warn!(contact_id = %contact_id, "contact too large to cache, relaying as-is");
                return Ok(response);
            }

            match response.buffer_body(max_body_bytes).await? {
                Some(body) => {
                    info!(contact_id = %contact_id, "caching contact");
                    store(cache.as_ref(), &key, &body).await;
                    response.body = Body::from(body);
                }
                None => {
                    warn!(contact_id = %contact_id, "contact too large to cache, relaying as-is");
                }
            }
            Ok(response)
        })
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// `POST /contact`: forward unmodified, drop the whole cache on a `200`.
///
/// The write path cannot tell which cached contacts a change affects, so a
/// successful write anywhere empties the store.
pub async fn create_contact(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    if request.method() != Method::POST {
        return not_found().await;
    }

    info!(upstream = %state.gateway.base_url(), "forwarding contact write upstream");
    let cache = state.cache.clone();

    state
        .gateway
        .forward_with(request, move |response: UpstreamResponse| async move {
            if response.status == StatusCode::OK {
                info!("invalidating cache");
                if let Err(e) = cache.invalidate().await {
                    warn!(error = %e, backend = cache.backend(), "cache invalidation failed");
                }
            }
            Ok(response)
        })
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

/// Percent-decoded bytes of the single `{id}` segment of `/contact/{id}`.
///
/// Decoding happens here rather than in a `Path` extractor so ids that are not
/// valid UTF-8 are still cached and forwarded. Empty ids and ids that decode
/// to something containing `/` are rejected.
fn contact_id_bytes(path: &str) -> Option<Vec<u8>> {
    let raw = path.strip_prefix("/contact/")?;
    let id: Vec<u8> = percent_decode_str(raw).collect();
    if id.is_empty() || id.contains(&b'/') {
        return None;
    }
    Some(id)
}

/// Raw bytes of the tenant header; an absent header is the empty secret.
fn tenant_secret<'a>(headers: &'a HeaderMap, name: &HeaderName) -> &'a [u8] {
    headers.get(name).map(|v| v.as_bytes()).unwrap_or_default()
}

async fn load(cache: &dyn CacheStore, key: &CacheKey) -> Option<Vec<u8>> {
    match cache.load(key.as_str()).await {
        Ok(value) => value,
        Err(e) => {
            // failed cache should not fail the request
            warn!(error = %e, backend = cache.backend(), "cache load failed, treating as miss");
            None
        }
    }
}

async fn store(cache: &dyn CacheStore, key: &CacheKey, value: &[u8]) {
    if let Err(e) = cache.store(key.as_str(), value).await {
        warn!(error = %e, backend = cache.backend(), "cache store failed");
    }
}
