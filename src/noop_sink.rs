use crate::event::LogEvent;
use crate::sink::{BatchSink, Delivery};
use async_trait::async_trait;

/// A sink that accepts and discards every batch.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// network I/O, and for tests that don't care about the endpoint.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl BatchSink for NoopSink {
    async fn post_batch(&self, _batch: &[LogEvent]) -> Delivery {
        Delivery::Delivered
    }
}
