use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

// Request ID middleware: preserve an incoming x-request-id or generate one,
// forward it upstream and echo it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let existing = req.headers().get(&X_REQUEST_ID).cloned();
    let req_id_value = match existing {
        Some(value) => value,
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .expect("uuid is a valid header value");
            req.headers_mut().insert(X_REQUEST_ID, generated.clone());
            generated
        }
    };

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(X_REQUEST_ID, req_id_value);
    res
}

// Access log: one line per request with method, path, client address, status
// and latency.
pub async fn access_log(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let started = Instant::now();
    let res = next.run(req).await;

    tracing::info!(
        http.method = %method,
        http.path = %path,
        remote_addr = %remote_addr,
        http.status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    res
}
