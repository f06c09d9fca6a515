#![cfg(feature = "http")]

use std::time::Duration;

use log_shipper::encoder::Encoder;
use log_shipper::{
    BatchSink, Delivery, HttpTransport, Level, LogEvent, LogRecord, LogShipper, ShipperConfig,
};
use mockito::{Matcher, Server};
use serde_json::Map;

fn events(messages: &[&str]) -> Vec<LogEvent> {
    let encoder = Encoder::new("http-test", Map::new());
    messages
        .iter()
        .map(|m| encoder.encode(LogRecord::new(Level::Info, *m)).unwrap())
        .collect()
}

#[tokio::test]
async fn posts_batch_as_json_array() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest")
        .match_header("content-type", "application/json")
        .match_header("x-api-key", "secret")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"^\[\{.*\},\{.*\}\]$"#.to_string()),
            Matcher::Regex(r#""message":"first""#.to_string()),
            Matcher::Regex(r#""service":\{"name":"http-test"\}"#.to_string()),
        ]))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let config = ShipperConfig::new(format!("{}/ingest", server.url()), "http-test")
        .with_header("x-api-key", "secret");
    let transport = HttpTransport::new(&config).unwrap();

    let delivery = transport.post_batch(&events(&["first", "second"])).await;
    assert_eq!(delivery, Delivery::Delivered);
    mock.assert_async().await;
}

#[tokio::test]
async fn non_2xx_is_a_rejection_with_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest")
        .with_status(500)
        .with_body("index is read-only")
        .expect(1)
        .create_async()
        .await;

    let config = ShipperConfig::new(format!("{}/ingest", server.url()), "http-test");
    let transport = HttpTransport::new(&config).unwrap();

    let delivery = transport.post_batch(&events(&["dropped"])).await;
    assert_eq!(
        delivery,
        Delivery::Rejected {
            status: 500,
            body: "index is read-only".to_string()
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_endpoint_is_a_failure() {
    let config = ShipperConfig::new("http://127.0.0.1:1/ingest", "http-test")
        .with_timeout(Duration::from_secs(2));
    let transport = HttpTransport::new(&config).unwrap();

    let delivery = transport.post_batch(&events(&["lost"])).await;
    assert!(matches!(delivery, Delivery::Failed { .. }));
}

#[tokio::test]
async fn closed_transport_refuses_batches() {
    let config = ShipperConfig::new("http://127.0.0.1:1/ingest", "http-test");
    let transport = HttpTransport::new(&config).unwrap();
    transport.close().await;

    let delivery = transport.post_batch(&events(&["late"])).await;
    assert_eq!(
        delivery,
        Delivery::Failed {
            reason: "transport is closed".to_string()
        }
    );
}

#[tokio::test]
async fn shipper_delivers_queued_events_on_stop() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest")
        .match_header("authorization", "Bearer token")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""message":"one""#.to_string()),
            Matcher::Regex(r#""message":"three""#.to_string()),
            Matcher::Regex(r#""env":"test""#.to_string()),
        ]))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let config = ShipperConfig::new(format!("{}/ingest", server.url()), "e2e")
        .with_header("authorization", "Bearer token")
        .with_extra_field("env", "test");
    let shipper = LogShipper::new(config).unwrap();

    shipper.emit(LogRecord::new(Level::Info, "one"));
    shipper.emit(LogRecord::new(Level::Warning, "two"));
    shipper.emit(LogRecord::new(Level::Error, "three"));
    shipper.start().await.unwrap();
    let stats = shipper.stop().await;

    mock.assert_async().await;
    assert_eq!(stats.batches_delivered, 1);
    assert_eq!(stats.events_delivered, 3);
}

#[tokio::test]
async fn rejected_batches_are_counted_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/ingest")
        .with_status(429)
        .expect(1)
        .create_async()
        .await;

    let config = ShipperConfig::new(format!("{}/ingest", server.url()), "e2e");
    let shipper = LogShipper::new(config).unwrap();

    shipper.emit(LogRecord::new(Level::Error, "throttled"));
    shipper.start().await.unwrap();
    let stats = shipper.stop().await;

    mock.assert_async().await;
    assert_eq!(stats.batches_rejected, 1);
    assert_eq!(stats.events_discarded, 1);
}
