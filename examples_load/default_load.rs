use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_shipper::init::init_tracing;
use log_shipper::noop_sink::NoopSink;
use log_shipper::{LogShipper, ShipperConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shipper = LogShipper::with_sink(ShipperConfig::default(), Arc::new(NoopSink))?;
    init_tracing(&shipper)?;
    shipper.start().await?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: emitted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let stats = shipper.stop().await;
    println!(
        "enqueued={} dropped={} delivered={}",
        stats.enqueued, stats.dropped, stats.events_delivered
    );
    Ok(())
}
