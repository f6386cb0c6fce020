//! Forwarding of inbound requests to the upstream contact API.

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{
        HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri,
        header::{CONTENT_LENGTH, HOST},
    },
    response::Response,
};
use futures_util::StreamExt;
use tracing::{debug, instrument};
use url::Url;

use super::error::GatewayError;
use crate::config::UpstreamConfig;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// An upstream response on its way back to the client.
///
/// Handed to the interception callback of [`Gateway::forward_with`]. The body
/// is still streaming from upstream until someone reads it.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl UpstreamResponse {
    /// Buffers the whole body if it fits in `limit` bytes.
    ///
    /// Returns `Ok(Some(bytes))` with the body moved out of the response. If the
    /// body turns out to be larger, returns `Ok(None)` and leaves the response
    /// with a body that replays the chunks already read followed by the rest
    /// of the upstream stream, so the client still receives every byte.
    /// Fails only if the upstream stream itself breaks.
    pub async fn buffer_body(&mut self, limit: usize) -> Result<Option<Bytes>, GatewayError> {
        let mut stream = std::mem::take(&mut self.body).into_data_stream();
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut total = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| GatewayError::ResponseBody(e.to_string()))?;
            total += chunk.len();
            chunks.push(chunk);

            if total > limit {
                let prefix = futures_util::stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                self.body = Body::from_stream(prefix.chain(stream));
                return Ok(None);
            }
        }

        let body = match chunks.len() {
            0 => Bytes::new(),
            1 => chunks.swap_remove(0),
            _ => {
                let mut joined = Vec::with_capacity(total);
                for chunk in &chunks {
                    joined.extend_from_slice(chunk);
                }
                Bytes::from(joined)
            }
        };
        Ok(Some(body))
    }

    /// Declared body length, if upstream sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Reverse proxy to a single fixed upstream base URL.
#[derive(Clone)]
pub struct Gateway {
    base_url: Url,
    client: reqwest::Client,
    request_body_limit: usize,
}

impl Gateway {
    /// Creates a gateway for `config.base_url`.
    ///
    /// Redirects are not followed: 3xx responses are relayed to the client.
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        let base_url = config.base_url().map_err(GatewayError::InvalidUpstream)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                GatewayError::InvalidUpstream(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url,
            client,
            request_body_limit: 1024 * 1024,
        })
    }

    /// Caps how much of an inbound request body is buffered for forwarding.
    pub fn with_request_body_limit(mut self, limit: usize) -> Self {
        self.request_body_limit = limit;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Maps an inbound URI onto the upstream: base path joined with the
    /// inbound path, inbound query appended to any base query.
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&join_paths(self.base_url.path(), uri.path()));

        let query = match (self.base_url.query().filter(|q| !q.is_empty()), uri.query()) {
            (Some(base), Some(inbound)) if !inbound.is_empty() => Some(format!("{base}&{inbound}")),
            (Some(base), _) => Some(base.to_string()),
            (None, Some(inbound)) if !inbound.is_empty() => Some(inbound.to_string()),
            (None, _) => None,
        };
        url.set_query(query.as_deref());
        url
    }

    /// Forwards `request` and relays the upstream response unmodified.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        self.forward_with(request, |response| std::future::ready(Ok(response)))
            .await
    }

    /// Forwards `request` and passes the upstream response through `intercept`
    /// before it is returned. The callback runs exactly once; if it fails the
    /// whole forward fails.
    #[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
    pub async fn forward_with<F, Fut>(
        &self,
        request: Request<Body>,
        intercept: F,
    ) -> Result<Response, GatewayError>
    where
        F: FnOnce(UpstreamResponse) -> Fut + Send,
        Fut: Future<Output = Result<UpstreamResponse, GatewayError>> + Send,
    {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let (parts, body) = request.into_parts();

        let target = self.target_url(&parts.uri);
        let headers = forward_headers(&parts.headers, &parts.uri, client_ip);

        let body_bytes = axum::body::to_bytes(body, self.request_body_limit)
            .await
            .map_err(|e| GatewayError::RequestBody(e.to_string()))?;

        debug!(target_url = %target, "forwarding request upstream");

        let mut builder = self
            .client
            .request(parts.method, target)
            .headers(headers);
        if !body_bytes.is_empty() {
            builder = builder.body(body_bytes);
        }

        let upstream = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Upstream(format!("timed out: {e}"))
            } else if e.is_connect() {
                GatewayError::Upstream(format!("failed to connect: {e}"))
            } else {
                GatewayError::Upstream(e.to_string())
            }
        })?;

        let status = upstream.status();
        debug!(status = %status, "upstream responded");

        let mut response_headers = HeaderMap::new();
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop_header(name.as_str()) {
                response_headers.append(name.clone(), value.clone());
            }
        }

        let response = UpstreamResponse {
            status,
            headers: response_headers,
            body: Body::from_stream(upstream.bytes_stream()),
        };

        let response = intercept(response).await?;
        Ok(response.into_response())
    }
}

/// Copies inbound headers for the upstream request.
///
/// Hop-by-hop headers and `Host` are dropped (the client sets `Host` from the
/// target URL); the original host is kept in `X-Forwarded-Host` and the client
/// address is appended to `X-Forwarded-For`.
fn forward_headers(
    incoming: &HeaderMap,
    uri: &Uri,
    client_ip: Option<std::net::IpAddr>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in incoming {
        if is_hop_by_hop_header(name.as_str()) || name == CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let original_host = incoming.get(HOST).cloned().or_else(|| {
        uri.authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    });
    match original_host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host);
        }
        None => {
            headers.remove(X_FORWARDED_HOST);
        }
    }

    if let Some(ip) = client_ip {
        let forwarded_for = match incoming.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    headers
}

/// Joins two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Checks if a header is a hop-by-hop header that should not be forwarded.
///
/// Hop-by-hop headers are defined in RFC 2616 Section 13.5.1.
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "host" // Host should be set to target, not forwarded
    )
}
