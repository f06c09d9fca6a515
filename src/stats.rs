use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between producers and the shipper loop.
///
/// All updates are `Relaxed`; the numbers are for the host's own metrics
/// and tests, not for synchronization.
#[derive(Debug, Default)]
pub struct Counters {
    /// Calls to `emit`, whatever their outcome.
    pub emitted: AtomicU64,
    /// Successfully placed in the queue.
    pub enqueued: AtomicU64,
    /// Rejected because the queue was full.
    pub dropped: AtomicU64,
    /// Below the minimum level.
    pub filtered: AtomicU64,
    /// Emitted while the shipper itself was submitting a batch.
    pub suppressed: AtomicU64,
    pub encode_failures: AtomicU64,
    pub batches_delivered: AtomicU64,
    pub batches_rejected: AtomicU64,
    pub batches_failed: AtomicU64,
    pub events_delivered: AtomicU64,
    /// Events in rejected or failed batches.
    pub events_discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ShipperStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ShipperStats {
            emitted: load(&self.emitted),
            enqueued: load(&self.enqueued),
            dropped: load(&self.dropped),
            filtered: load(&self.filtered),
            suppressed: load(&self.suppressed),
            encode_failures: load(&self.encode_failures),
            batches_delivered: load(&self.batches_delivered),
            batches_rejected: load(&self.batches_rejected),
            batches_failed: load(&self.batches_failed),
            events_delivered: load(&self.events_delivered),
            events_discarded: load(&self.events_discarded),
        }
    }
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShipperStats {
    pub emitted: u64,
    pub enqueued: u64,
    pub dropped: u64,
    pub filtered: u64,
    pub suppressed: u64,
    pub encode_failures: u64,
    pub batches_delivered: u64,
    pub batches_rejected: u64,
    pub batches_failed: u64,
    pub events_delivered: u64,
    pub events_discarded: u64,
}

impl ShipperStats {
    /// Events that were enqueued but have not reached a transport outcome yet.
    pub fn in_flight(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.events_delivered + self.events_discarded)
    }
}
