use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::error;

use log_shipper::init::{init_tracing_with_config, InitConfig};
use log_shipper::noop_sink::NoopSink;
use log_shipper::{Level, LogShipper, ShipperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ShipperConfig::new("http://localhost:8080/ingest", "load-test")
        .with_min_level(Level::Warning)
        .with_queue_capacity(50_000)
        .with_batch_size(1_000)
        .with_flush_interval(Duration::from_millis(200))
        .with_shutdown_timeout(Duration::from_secs(5));

    let shipper = LogShipper::with_sink(config, Arc::new(NoopSink))?;

    init_tracing_with_config(
        &shipper,
        InitConfig {
            enable_stdout: false,
            ..InitConfig::default()
        },
    )?;
    shipper.start().await?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "custom load test error");
    }

    let elapsed = start.elapsed();
    println!("custom config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let stats = shipper.stop().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
