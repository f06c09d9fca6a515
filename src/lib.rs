//! Non-blocking, batched shipping of structured log events to an HTTP
//! ingest endpoint.
//!
//! Records are encoded on the caller's thread, pushed into a bounded queue
//! with `try_send`, and shipped by a background task in JSON-array batches
//! triggered by size or by a flush interval. See [`pipeline::LogShipper`].

pub mod config;
pub mod diagnostics;
pub mod encoder;
pub mod env;
pub mod error;
pub mod event;
pub mod init;
pub mod layer;
pub mod noop_sink;
pub mod pipeline;
pub mod queue;
pub mod record;
pub mod shipper;
pub mod sink;
pub mod stats;

#[cfg(feature = "http")]
pub mod transport;

pub use config::ShipperConfig;
pub use error::{ConfigError, EncodeError, ShipperError};
pub use event::LogEvent;
pub use layer::IngestLayer;
pub use pipeline::{Emitter, LogShipper};
pub use record::{Level, LogRecord};
pub use shipper::ShipperState;
pub use sink::{BatchSink, Delivery};
pub use stats::ShipperStats;

#[cfg(feature = "http")]
pub use transport::HttpTransport;
