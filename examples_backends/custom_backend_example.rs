use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use log_shipper::{
    init::init_tracing,
    BatchSink, Delivery, LogEvent, LogShipper, ShipperConfig,
};

/// Example of integrating a completely custom backend by implementing
/// the `BatchSink` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a built-in
/// transport.
struct MyCustomDbSink;

#[async_trait]
impl BatchSink for MyCustomDbSink {
    async fn post_batch(&self, batch: &[LogEvent]) -> Delivery {
        // Here you would call your own client library for the target store.
        // For the sake of example we just print the batch.
        match serde_json::to_string(batch) {
            Ok(body) => {
                println!("[my-custom-db] {} events: {}", batch.len(), body);
                Delivery::Delivered
            }
            Err(e) => Delivery::Failed { reason: e.to_string() },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ShipperConfig::default().with_extra_field("env", "demo");
    let shipper = LogShipper::with_sink(config, Arc::new(MyCustomDbSink))?;

    init_tracing(&shipper)?;
    shipper.start().await?;

    info!("custom backend example started");
    error!(db = "my-custom-db", "simulated error sent via custom backend");

    shipper.stop().await;
    Ok(())
}
