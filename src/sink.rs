use crate::event::LogEvent;
use async_trait::async_trait;

/// Outcome of one attempt to deliver a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The endpoint answered with a 2xx status.
    Delivered,
    /// The endpoint answered with any other status. `body` is truncated.
    Rejected { status: u16, body: String },
    /// The request never produced a response (connect error, timeout,
    /// serialization failure, closed transport).
    Failed { reason: String },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

/// Asynchronous destination for batches of [`LogEvent`]s.
///
/// Implementations transport a batch to a concrete backend. The shipper
/// loop calls `post_batch` from its background task, exactly once per
/// batch, and never awaits it on an application thread.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Make one attempt to deliver `batch`.
    ///
    /// **Parameters**
    /// - `batch`: events in enqueue order, never empty.
    ///
    /// **Returns**
    /// - a [`Delivery`] describing the attempt. Implementations must not
    ///   panic and must not retry; the batch is discarded whatever the
    ///   outcome.
    async fn post_batch(&self, batch: &[LogEvent]) -> Delivery;

    /// Release connections or other resources. Called once when the
    /// shipper loop stops. Default implementation is a no-op.
    async fn close(&self) {}
}
