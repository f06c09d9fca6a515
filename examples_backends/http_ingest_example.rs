use tracing::{error, info, warn};

use log_shipper::init::init_tracing;
use log_shipper::{Level, LogRecord, LogShipper, ShipperConfig};

/// Ships to the endpoint named by `LOG_SHIPPER_INGEST_URL` (default
/// `http://localhost:8080/ingest`). Every other `LOG_SHIPPER_*` variable
/// is honored as well.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ShipperConfig::from_env()?.with_extra_field("env", "demo");
    let shipper = LogShipper::new(config)?;

    init_tracing(&shipper)?;
    shipper.start().await?;

    info!(user_id = 42, label.team = "payments", "user signed in");
    warn!(trace_id = "4bf92f3577b34da6", "slow upstream response");

    let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
    error!(error = &err as &(dyn std::error::Error + 'static), "charge failed");

    // Records can also be built by hand, bypassing `tracing`.
    shipper.emit(
        LogRecord::new(Level::Critical, "disk almost full")
            .logger("storage")
            .field("free_bytes", 1_024)
            .label("region", "eu-west-1"),
    );

    let stats = shipper.stop().await;
    println!(
        "delivered={} discarded={} dropped={}",
        stats.events_delivered, stats.events_discarded, stats.dropped
    );
    Ok(())
}
