//! Tests for the gateway module

use super::*;
use crate::error::Error;
use crate::model::EntityKind;
use crate::streams::find_stream;
use crate::window::Window;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(base_url: &str) -> HttpGateway {
    let config = GatewayConfig::new(base_url, "m1", "pub", "priv").without_rate_limit();
    HttpGateway::new(config).unwrap()
}

fn march_first() -> Window {
    Window::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
    )
}

async fn drain(results: &mut Box<dyn ResultSet>) -> Vec<String> {
    let mut ids = Vec::new();
    while let Some(record) = results.next_record().await.unwrap() {
        ids.push(record.id().unwrap_or_default().to_string());
    }
    ids
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_gateway_config_defaults() {
    let config = GatewayConfig::new("https://example.com", "m1", "pub", "priv");
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::default()));
    assert!(config.user_agent.starts_with("solidafy-braintree/"));
}

#[test]
fn test_gateway_config_debug_hides_private_key() {
    let config = GatewayConfig::new("https://example.com", "m1", "pub", "s3cr3t");
    let debug = format!("{config:?}");
    assert!(!debug.contains("s3cr3t"));
    assert!(debug.contains("pub"));
}

#[tokio::test]
async fn test_buffered_result_set() {
    let records = vec![
        crate::model::Entity::new(EntityKind::Plan),
        crate::model::Entity::new(EntityKind::Plan),
    ];
    let mut results = BufferedResultSet::new(records).with_maximum_size(10);
    assert_eq!(results.maximum_size(), 10);
    assert!(results.next_record().await.unwrap().is_some());
    assert_eq!(results.remaining(), 1);
    assert!(results.next_record().await.unwrap().is_some());
    assert!(results.next_record().await.unwrap().is_none());
}

// ============================================================================
// Two-phase Search
// ============================================================================

#[tokio::test]
async fn test_search_fetches_ids_then_pages() {
    let mock_server = MockServer::start().await;
    let credentials = format!("Basic {}", STANDARD.encode("pub:priv"));

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search_ids"))
        .and(header("authorization", credentials.as_str()))
        .and(body_json(json!({
            "search": {
                "created_at": {"min": "2024-03-01T00:00:00Z", "max": "2024-03-02T00:00:00Z"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search_results": {"page_size": 2, "ids": ["t1", "t2", "t3"]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search"))
        .and(body_json(json!({"search": {"ids": ["t1", "t2"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [{"id": "t1", "amount": "1.00"}, {"id": "t2", "amount": "2.00"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search"))
        .and(body_json(json!({"search": {"ids": ["t3"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [{"id": "t3", "amount": "3.00"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("transactions").unwrap();
    let mut results = gateway.search(stream, march_first()).await.unwrap();

    assert_eq!(results.maximum_size(), 3);
    assert_eq!(drain(&mut results).await, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn test_search_with_no_ids_makes_no_page_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/customers/advanced_search_ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search_results": {"page_size": 50, "ids": []}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/customers/advanced_search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("customers").unwrap();
    let mut results = gateway.search(stream, march_first()).await.unwrap();

    assert_eq!(results.maximum_size(), 0);
    assert!(results.next_record().await.unwrap().is_none());
}

#[tokio::test]
async fn test_all_enumerates_full_collection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/merchants/m1/plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "plans": [{"id": "basic", "price": "9.99"}, {"id": "pro", "price": "29.99"}]
        })))
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("plans").unwrap();
    let mut results = gateway.all(stream).await.unwrap();

    assert_eq!(results.maximum_size(), 2);
    assert_eq!(drain(&mut results).await, vec!["basic", "pro"]);
}

#[tokio::test]
async fn test_windowed_search_on_full_table_stream_fails() {
    let gateway = gateway("http://127.0.0.1:9");
    let stream = find_stream("plans").unwrap();
    let result = gateway.search(stream, march_first()).await;
    assert!(matches!(result, Err(Error::Config { .. })));
}

// ============================================================================
// Failure Classification
// ============================================================================

#[tokio::test]
async fn test_503_is_maintenance() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search_ids"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down for maintenance"))
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("transactions").unwrap();
    let err = gateway.search(stream, march_first()).await.err().unwrap();

    assert!(err.is_maintenance());
    assert!(!err.is_connectivity());
    assert!(err.to_string().contains("down for maintenance"));
}

#[tokio::test]
async fn test_503_while_paging_is_maintenance() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search_ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search_results": {"page_size": 50, "ids": ["t1"]}
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("transactions").unwrap();
    let mut results = gateway.search(stream, march_first()).await.unwrap();

    let err = results.next_record().await.err().unwrap();
    assert!(err.is_maintenance());
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/transactions/advanced_search_ids"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"search_results": {"ids": []}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = GatewayConfig::new(mock_server.uri(), "m1", "pub", "priv")
        .without_rate_limit()
        .with_timeout(Duration::from_millis(100));
    let gateway = HttpGateway::new(config).unwrap();
    let stream = find_stream("transactions").unwrap();
    let err = gateway.search(stream, march_first()).await.err().unwrap();

    assert!(matches!(err, Error::Timeout { timeout_ms: 100 }));
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn test_refused_connection_is_connectivity() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let gateway = gateway(&format!("http://127.0.0.1:{port}"));
    let stream = find_stream("customers").unwrap();
    let err = gateway.search(stream, march_first()).await.err().unwrap();

    assert!(err.is_connectivity());
    assert!(!err.is_maintenance());
}

#[tokio::test]
async fn test_client_error_is_fatal_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/merchants/m1/plans"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());
    let stream = find_stream("plans").unwrap();
    let err = gateway.all(stream).await.err().unwrap();

    match err {
        Error::HttpStatus { status, ref body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_search_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/merchants/m1/subscriptions/advanced_search_ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/merchants/m1/plans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&mock_server)
        .await;

    let gateway = gateway(&mock_server.uri());

    let subscriptions = find_stream("subscriptions").unwrap();
    let err = gateway.search(subscriptions, march_first()).await.err().unwrap();
    assert!(matches!(err, Error::SearchResponse { .. }));

    let plans = find_stream("plans").unwrap();
    let err = gateway.all(plans).await.err().unwrap();
    assert!(matches!(err, Error::SearchResponse { .. }));
}
