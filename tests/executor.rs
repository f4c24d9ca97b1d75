use market_crawler::executor::{Fetch, RequestExecutor};
use market_crawler::proxy::ProxyEndpoint;
use std::time::Duration;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The mock server stands in for the proxy; targets are never resolved.
async fn proxy_server() -> (MockServer, ProxyEndpoint) {
    let server = MockServer::start().await;
    let proxy = ProxyEndpoint::parse(&server.uri()).expect("mock proxy url");
    (server, proxy)
}

#[tokio::test]
async fn identity_headers_travel_through_the_proxy() {
    let (server, proxy) = proxy_server().await;
    Mock::given(method("GET"))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .and(header("user-agent", "agent/1.0"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":"OK"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new("en-US,en;q=0.9", Duration::from_secs(5));
    let response = executor
        .fetch(&proxy, "session=abc", "agent/1.0", "http://market.test/goods/42")
        .await
        .expect("fetch");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, br#"{"code":"OK"}"#.to_vec());
}

#[tokio::test]
async fn refusals_come_back_as_data() {
    let (server, proxy) = proxy_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new("en", Duration::from_secs(5));
    let response = executor
        .fetch(&proxy, "", "agent", "http://market.test/api")
        .await
        .expect("429 is not a transport failure");

    assert_eq!(response.status, 429);
    assert_eq!(response.body, b"slow down".to_vec());
}

#[tokio::test]
async fn slow_responses_time_out_as_transport_errors() {
    let (server, proxy) = proxy_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let executor = RequestExecutor::new("en", Duration::from_millis(200));
    let err = executor
        .fetch(&proxy, "", "agent", "http://market.test/api")
        .await
        .expect_err("timeout");

    assert!(err.is_transport());
}

#[tokio::test]
async fn repeated_requests_reuse_the_proxy_client() {
    let (server, proxy) = proxy_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let executor = RequestExecutor::new("en", Duration::from_secs(5));
    for _ in 0..2 {
        executor
            .fetch(&proxy, "", "agent", "http://market.test/api")
            .await
            .expect("fetch");
    }
}
