mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use ccproxy_server::{Gateway, GatewayError, MemoryCache, UpstreamConfig};
use common::{TENANT_HEADER, proxy_config, start_proxy, start_proxy_with};
use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTACT: &str = r#"{"contact_id":"0","Email":"some@email.com"}"#;

#[tokio::test]
async fn read_is_forwarded_under_base_path() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/contact/abc"))
        .and(query_param("fields", "email"))
        .and(header(TENANT_HEADER, "apiKey"))
        .and(header_exists("x-forwarded-host"))
        .and(header_exists("x-request-id"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "99")
                .set_body_string(CONTACT),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let base_url = format!("{}/v1", upstream.uri());
    let proxy = start_proxy(&base_url, Arc::new(MemoryCache::new())).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/contact/abc?fields=email", proxy.base))
        .header(TENANT_HEADER, "apiKey")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "99");
    assert_eq!(resp.text().await.unwrap(), CONTACT);
}

#[tokio::test]
async fn write_body_is_forwarded_unmodified() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/contact"))
        .and(header(TENANT_HEADER, "apiKey"))
        .and(header("content-type", "application/json"))
        .and(body_string(CONTACT))
        .respond_with(
            ResponseTemplate::new(201).set_body_string(r#"{"contact_id":"person_1"}"#),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let base_url = format!("{}/v1", upstream.uri());
    let proxy = start_proxy(&base_url, Arc::new(MemoryCache::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/contact", proxy.base))
        .header(TENANT_HEADER, "apiKey")
        .header("content-type", "application/json")
        .body(CONTACT)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.text().await.unwrap(), r#"{"contact_id":"person_1"}"#);
}

#[tokio::test]
async fn non_ok_write_does_not_invalidate() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&upstream)
        .await;

    let cache = Arc::new(MemoryCache::new());
    cache_entry(&cache).await;
    let proxy = start_proxy(&upstream.uri(), cache.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/contact", proxy.base))
        .body(CONTACT)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn redirects_are_relayed_not_followed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contact/moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://elsewhere.example/"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let proxy = start_proxy(&upstream.uri(), cache.clone()).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!("{}/contact/moved", proxy.base))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["location"], "https://elsewhere.example/");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    let proxy = start_proxy("http://127.0.0.1:1", Arc::new(MemoryCache::new())).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/contact/abc", proxy.base))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(resp.text().await.unwrap(), "Bad Gateway");
}

#[tokio::test]
async fn failed_intercept_fails_the_forward() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTACT))
        .mount(&upstream)
        .await;

    let gateway = Gateway::new(&UpstreamConfig {
        base_url: upstream.uri(),
        ..UpstreamConfig::default()
    })
    .expect("valid upstream");

    let request = Request::get("/contact/abc").body(Body::empty()).unwrap();
    let err = gateway
        .forward_with(request, |_response| async {
            Err(GatewayError::Intercept("rejected".into()))
        })
        .await
        .expect_err("intercept error must propagate");

    assert!(matches!(err, GatewayError::Intercept(_)));
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn plain_forward_relays_status_and_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/contact/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(r#"{"error":"Contact could not be found"}"#),
        )
        .mount(&upstream)
        .await;

    let gateway = Gateway::new(&UpstreamConfig {
        base_url: upstream.uri(),
        ..UpstreamConfig::default()
    })
    .expect("valid upstream");

    let request = Request::get("/contact/missing").body(Body::empty()).unwrap();
    let response = gateway.forward(request).await.expect("forwarded");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], br#"{"error":"Contact could not be found"}"#);
}

#[tokio::test]
async fn slow_upstream_is_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CONTACT)
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&upstream)
        .await;

    let mut cfg = proxy_config(&upstream.uri());
    cfg.upstream.timeout_ms = 200;
    cfg.server.request_timeout_ms = 5_000;
    cfg.validate().expect("valid timeouts");
    let cache = Arc::new(MemoryCache::new());
    let proxy = start_proxy_with(&cfg, cache.clone()).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/contact/slow", proxy.base))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn elapsed_request_deadline_is_gateway_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(CONTACT)
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&upstream)
        .await;

    // Deadline shorter than the upstream timeout, so the deadline fires first.
    let mut cfg = proxy_config(&upstream.uri());
    cfg.server.request_timeout_ms = 200;
    cfg.upstream.timeout_ms = 5_000;
    let proxy = start_proxy_with(&cfg, Arc::new(MemoryCache::new())).await;

    let resp = reqwest::Client::new()
        .get(format!("{}/contact/slow", proxy.base))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), "Gateway Timeout");
}

async fn cache_entry(cache: &MemoryCache) {
    use ccproxy_server::CacheStore;
    cache.store("existing", b"cached").await.unwrap();
}
