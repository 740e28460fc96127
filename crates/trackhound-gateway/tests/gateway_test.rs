use std::time::Duration;
use tempfile::TempDir;
use trackhound_gateway::{Gateway, GatewayConfig, GatewayError, Method, RequestOptions};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_with_cache(dir: &TempDir) -> Gateway {
    Gateway::new(GatewayConfig {
        cache_dir: Some(dir.path().join("http")),
        ..GatewayConfig::default()
    })
    .expect("create gateway")
}

#[tokio::test]
async fn test_successful_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
        .mount(&server)
        .await;

    let gateway = Gateway::new(GatewayConfig::default()).expect("create gateway");
    let page = gateway
        .get(&format!("{}/releases", server.uri()))
        .await
        .expect("page fetched");

    assert_eq!(page.status, 200);
    assert_eq!(page.text(), "<p>hello</p>");
    assert!(!page.from_cache);
    assert!(gateway.html(Some(&page)).is_some());
}

#[tokio::test]
async fn test_error_status_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let gateway = Gateway::new(GatewayConfig::default()).expect("create gateway");
    let url = format!("{}/down", server.uri());

    assert!(gateway.get(&url).await.is_none());
    assert!(matches!(
        gateway
            .try_request(Method::GET, &url, &RequestOptions::default())
            .await,
        Err(GatewayError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_timeout_returns_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let gateway = Gateway::new(GatewayConfig {
        timeout: Duration::from_millis(200),
        ..GatewayConfig::default()
    })
    .expect("create gateway");
    let url = format!("{}/slow", server.uri());

    assert!(gateway
        .request(Method::GET, &url, RequestOptions::new().silent())
        .await
        .is_none());
    assert!(matches!(
        gateway
            .try_request(Method::GET, &url, &RequestOptions::default())
            .await,
        Err(GatewayError::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_host_returns_none() {
    let gateway = Gateway::new(GatewayConfig {
        timeout: Duration::from_secs(2),
        ..GatewayConfig::default()
    })
    .expect("create gateway");

    assert!(gateway.get("http://127.0.0.1:1/nothing").await.is_none());
    assert!(gateway.get("not a url").await.is_none());
}

#[tokio::test]
async fn test_malformed_body_parses_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"tracks\": [oops"))
        .mount(&server)
        .await;

    let gateway = Gateway::new(GatewayConfig::default()).expect("create gateway");
    let page = gateway.get(&format!("{}/api", server.uri())).await;

    assert!(page.is_some());
    assert!(gateway.json::<serde_json::Value>(page.as_ref()).is_none());
    assert!(gateway.html(page.as_ref()).is_none());
}

#[tokio::test]
async fn test_fresh_cache_entry_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>cached</p>")
                .insert_header("Cache-Control", "max-age=3600"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let gateway = gateway_with_cache(&tmp);
    let url = format!("{}/fresh", server.uri());

    let first = gateway.get(&url).await.expect("first fetch");
    let second = gateway.get(&url).await.expect("second fetch");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.text(), "<p>cached</p>");
}

#[tokio::test]
async fn test_cache_persists_across_gateways() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>cached</p>")
                .insert_header("Cache-Control", "max-age=3600"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let url = format!("{}/fresh", server.uri());

    gateway_with_cache(&tmp).get(&url).await.expect("first run");
    let page = gateway_with_cache(&tmp).get(&url).await.expect("second run");
    assert!(page.from_cache);
}

#[tokio::test]
async fn test_stale_entry_is_revalidated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/etag"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/etag"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>v1</p>")
                .insert_header("ETag", "\"v1\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let gateway = gateway_with_cache(&tmp);
    let url = format!("{}/etag", server.uri());

    let first = gateway.get(&url).await.expect("first fetch");
    let second = gateway.get(&url).await.expect("revalidated fetch");

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.text(), "<p>v1</p>");
}

#[tokio::test]
async fn test_stale_entry_without_validators_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .and(header_exists("If-None-Match"))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .and(header_exists("If-Modified-Since"))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>plain</p>"))
        .expect(2)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let gateway = gateway_with_cache(&tmp);
    let url = format!("{}/plain", server.uri());

    for _ in 0..2 {
        let page = gateway.get(&url).await.expect("fetch");
        assert!(!page.from_cache);
        assert_eq!(page.text(), "<p>plain</p>");
    }
}

#[tokio::test]
async fn test_post_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/playlist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"ok\": true}")
                .insert_header("Cache-Control", "max-age=3600"),
        )
        .expect(2)
        .mount(&server)
        .await;

    let tmp = TempDir::new().expect("create temp dir");
    let gateway = gateway_with_cache(&tmp);
    let url = format!("{}/playlist", server.uri());

    for _ in 0..2 {
        let page = gateway
            .request(Method::POST, &url, RequestOptions::new().form("product_id", "7"))
            .await
            .expect("post succeeds");
        assert!(!page.from_cache);
    }
}

#[tokio::test]
async fn test_reset_session_drops_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "token=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>ok</p>"))
        .mount(&server)
        .await;

    let gateway = Gateway::new(GatewayConfig::default()).expect("create gateway");
    let page_url = format!("{}/page", server.uri());

    gateway.get(&format!("{}/login", server.uri())).await.expect("login");
    gateway.get(&page_url).await.expect("page with cookie");
    gateway
        .request(Method::GET, &page_url, RequestOptions::new().reset_session())
        .await
        .expect("page without cookie");

    let requests = server.received_requests().await.expect("recording enabled");
    let page_requests: Vec<_> = requests
        .iter()
        .filter(|request| request.url.path() == "/page")
        .collect();
    assert_eq!(page_requests.len(), 2);

    let cookie = |index: usize| {
        page_requests[index]
            .headers
            .get("cookie")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(cookie(0).as_deref(), Some("token=abc"));
    assert_eq!(cookie(1), None);
}
