mod common;

use std::sync::Arc;

use common::RecordingSink;
use log_shipper::init::{ingest_layer, InitConfig};
use log_shipper::{Level, LogShipper, ShipperConfig};
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

async fn ship_events(min_level: Level, emit: impl FnOnce()) -> Vec<Value> {
    let sink = RecordingSink::new();
    let config = ShipperConfig::new("http://localhost:8080/ingest", "layer-test")
        .with_min_level(min_level);
    let shipper = LogShipper::with_sink(config, Arc::new(sink.clone())).unwrap();

    let init = InitConfig {
        enable_stdout: false,
        extra_ignored_targets: vec!["layer_test::noisy".to_string()],
        ..InitConfig::default()
    };
    let subscriber = Registry::default().with(ingest_layer(&shipper, &init));
    tracing::subscriber::with_default(subscriber, emit);

    shipper.start().await.unwrap();
    shipper.stop().await;

    sink.batches()
        .concat()
        .iter()
        .map(|e| serde_json::to_value(e).unwrap())
        .collect()
}

#[tokio::test]
async fn tracing_events_become_wire_events() {
    let events = ship_events(Level::Info, || {
        tracing::info!(user_id = 42, ok = true, "user signed in");
    })
    .await;

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["message"], "user signed in");
    assert_eq!(event["log"]["level"], "INFO");
    assert_eq!(event["service"]["name"], "layer-test");
    assert_eq!(event["fields"]["user_id"], 42);
    assert_eq!(event["fields"]["ok"], true);
    assert_eq!(event["fields"]["logger"], "layer_test");
    assert_eq!(event["fields"]["source"]["func"], "layer_test");
    assert!(event["fields"]["source"]["file"]
        .as_str()
        .unwrap()
        .ends_with("layer_test.rs"));
    assert!(event.get("trace").is_none());
    assert!(event.get("labels").is_none());
}

#[tokio::test]
async fn errors_trace_ids_and_labels_are_lifted() {
    let events = ship_events(Level::Info, || {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "card declined");
        tracing::error!(
            trace_id = "4bf92f3577b34da6",
            label.team = "payments",
            error = &err as &(dyn std::error::Error + 'static),
            "charge failed"
        );
        tracing::error!(
            error = &err as &(dyn std::error::Error + 'static),
            error.kind = "PaymentError",
            "charge failed again"
        );
    })
    .await;

    assert_eq!(events.len(), 2);
    let first = &events[0];
    assert_eq!(first["log"]["level"], "ERROR");
    assert_eq!(first["trace"]["id"], "4bf92f3577b34da6");
    assert_eq!(first["labels"]["team"], "payments");
    assert_eq!(first["fields"]["exception"]["type"], "error");
    assert_eq!(first["fields"]["exception"]["message"], "card declined");
    assert!(first["fields"].get("trace_id").is_none());

    assert_eq!(events[1]["fields"]["exception"]["type"], "PaymentError");
}

#[tokio::test]
async fn span_name_is_attached() {
    let events = ship_events(Level::Info, || {
        let span = tracing::info_span!("checkout");
        let _entered = span.enter();
        tracing::warn!("cart is empty");
    })
    .await;

    assert_eq!(events[0]["fields"]["span"]["name"], "checkout");
    assert_eq!(events[0]["log"]["level"], "WARNING");
}

#[tokio::test]
async fn filtered_and_ignored_events_never_reach_the_sink() {
    let events = ship_events(Level::Warning, || {
        tracing::info!("below threshold");
        tracing::error!(target: "log_shipper::side_channel", "own diagnostics");
        tracing::error!(target: "layer_test::noisy", "muted module");
        tracing::error!(target: "reqwest::connect", "http stack");
        tracing::error!("kept");
    })
    .await;

    let messages: Vec<&str> = events.iter().filter_map(|e| e["message"].as_str()).collect();
    assert_eq!(messages, ["kept"]);
}

#[test]
fn layer_without_stdout_reports_failed_batches_to_stderr() {
    let shipper = LogShipper::with_sink(ShipperConfig::default(), Arc::new(RecordingSink::new())).unwrap();
    let quiet = InitConfig {
        enable_stdout: false,
        ..InitConfig::default()
    };
    let layer = ingest_layer(&shipper, &quiet);
    let reported = Arc::clone(&layer.reported_events);

    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::warn!(
            target: "log_shipper::side_channel",
            batch_len = 3,
            error = "connection refused",
            "log ingest request failed, dropping batch"
        );
    });
    assert_eq!(reported.load(std::sync::atomic::Ordering::Relaxed), 1);

    let layer = ingest_layer(&shipper, &InitConfig::default());
    let reported = Arc::clone(&layer.reported_events);
    tracing::subscriber::with_default(Registry::default().with(layer), || {
        tracing::warn!(target: "log_shipper::side_channel", "printed by the fmt layer instead");
    });
    assert_eq!(reported.load(std::sync::atomic::Ordering::Relaxed), 0);
}
