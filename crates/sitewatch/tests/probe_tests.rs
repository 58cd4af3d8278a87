//! HTTP prober behaviour against local endpoints

use std::time::Duration;

use sitewatch::{HttpProber, Prober};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(route: &str, template: ResponseTemplate) -> MockServer {
    let _ = tracing_subscriber::fmt::try_init();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_probe_ok() {
    let server = server_with("/ok", ResponseTemplate::new(200)).await;
    let prober = HttpProber::new(Duration::from_secs(5)).unwrap();

    let url = format!("{}/ok", server.uri());
    let result = prober.probe(&url).await;

    assert_eq!(result.url, url);
    assert!(result.success);
    assert_eq!(result.status_code, 200);
    assert!(result.error_message.is_empty());
    assert!(result.response_time_ms >= 0);
}

#[tokio::test]
async fn test_probe_server_error_is_unsuccessful_response() {
    let server = server_with("/broken", ResponseTemplate::new(503)).await;
    let prober = HttpProber::new(Duration::from_secs(5)).unwrap();

    let result = prober.probe(&format!("{}/broken", server.uri())).await;

    assert!(!result.success);
    assert_eq!(result.status_code, 503);
    assert!(result.error_message.is_empty());
}

#[tokio::test]
async fn test_probe_follows_redirects() {
    let server = server_with(
        "/moved",
        ResponseTemplate::new(301).insert_header("location", "/landing"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let prober = HttpProber::new(Duration::from_secs(5)).unwrap();

    let result = prober.probe(&format!("{}/moved", server.uri())).await;

    assert!(result.success);
    assert_eq!(result.status_code, 200);
}

#[tokio::test]
async fn test_probe_timeout() {
    let server = server_with(
        "/slow",
        ResponseTemplate::new(200).set_delay(Duration::from_secs(10)),
    )
    .await;
    let prober = HttpProber::new(Duration::from_millis(300)).unwrap();

    let result = prober.probe(&format!("{}/slow", server.uri())).await;

    assert!(!result.success);
    assert_eq!(result.status_code, 0);
    assert!(!result.error_message.is_empty());
    assert!(result.response_time_ms >= 250, "took {} ms", result.response_time_ms);
    assert!(result.response_time_ms < 3_000, "took {} ms", result.response_time_ms);
}

#[tokio::test]
async fn test_probe_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let prober = HttpProber::new(Duration::from_secs(2)).unwrap();
    let result = prober.probe(&format!("http://127.0.0.1:{port}/")).await;

    assert!(!result.success);
    assert_eq!(result.status_code, 0);
    assert!(!result.error_message.is_empty());
}

#[tokio::test]
async fn test_probe_invalid_url() {
    let prober = HttpProber::new(Duration::from_secs(1)).unwrap();
    let result = prober.probe("not a url").await;

    assert!(!result.success);
    assert_eq!(result.status_code, 0);
    assert!(!result.error_message.is_empty());
}
