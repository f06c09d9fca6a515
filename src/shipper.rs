use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::diagnostics;
use crate::event::LogEvent;
use crate::queue::{EventReceiver, WaitOutcome};
use crate::sink::{BatchSink, Delivery};
use crate::stats::Counters;

tokio::task_local! {
    static SHIPPING: ();
}

/// True while the current task is inside a batch submission. Records
/// emitted there are suppressed so the pipeline never logs into itself.
pub fn is_shipping() -> bool {
    SHIPPING.try_with(|_| ()).is_ok()
}

/// Lifecycle of the shipper loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipperState {
    Stopped,
    Running,
    Draining,
}

/// Lock-free holder for the current [`ShipperState`], shared between the
/// loop and its controller.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        StateCell(AtomicU8::new(ShipperState::Stopped as u8))
    }

    pub(crate) fn get(&self) -> ShipperState {
        match self.0.load(Ordering::Acquire) {
            1 => ShipperState::Running,
            2 => ShipperState::Draining,
            _ => ShipperState::Stopped,
        }
    }

    pub(crate) fn set(&self, state: ShipperState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The single consumer of the event queue.
///
/// Waits up to `flush_interval` for an event, then keeps collecting until
/// the batch holds `batch_size` events or `flush_interval` has passed since
/// that first event, and submits it.
/// On cancellation it drains the remaining queue in `batch_size` chunks,
/// closes the sink, and hands the queue back.
pub(crate) struct ShipperLoop {
    queue: EventReceiver,
    sink: Arc<dyn BatchSink>,
    batch_size: usize,
    flush_interval: Duration,
    counters: Arc<Counters>,
    state: Arc<StateCell>,
    batches: u64,
}

impl ShipperLoop {
    pub(crate) fn new(
        queue: EventReceiver,
        sink: Arc<dyn BatchSink>,
        batch_size: usize,
        flush_interval: Duration,
        counters: Arc<Counters>,
        state: Arc<StateCell>,
    ) -> Self {
        Self {
            queue,
            sink,
            batch_size: batch_size.max(1),
            flush_interval,
            counters,
            state,
            batches: 0,
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) -> EventReceiver {
        self.state.set(ShipperState::Running);
        let mut batch: Vec<LogEvent> = Vec::with_capacity(self.batch_size);

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.queue.wait_for_item(self.flush_interval) => outcome,
            };

            match outcome {
                WaitOutcome::Item(event) => {
                    batch.push(event);
                    let deadline = Instant::now() + self.flush_interval;
                    let cancelled = self.fill(&mut batch, deadline, &cancel).await;
                    self.ship(&mut batch).await;
                    if cancelled {
                        break;
                    }
                }
                WaitOutcome::TimedOut => {}
                WaitOutcome::Closed => break,
            }
        }

        self.state.set(ShipperState::Draining);
        diagnostics::draining();
        loop {
            let room = self.batch_size - batch.len();
            self.queue.drain_into(&mut batch, room);
            if batch.is_empty() {
                break;
            }
            self.ship(&mut batch).await;
        }

        self.sink.close().await;
        diagnostics::stopped(self.batches);
        self.state.set(ShipperState::Stopped);
        self.queue
    }

    /// Keep adding events to `batch` until it holds `batch_size` events or
    /// `deadline` passes. Returns `true` if cancellation cut the wait short.
    async fn fill(
        &mut self,
        batch: &mut Vec<LogEvent>,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> bool {
        while batch.len() < self.batch_size {
            let room = self.batch_size - batch.len();
            if self.queue.drain_into(batch, room) > 0 {
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return true,
                outcome = self.queue.wait_until(deadline) => outcome,
            };
            match outcome {
                WaitOutcome::Item(event) => batch.push(event),
                WaitOutcome::TimedOut | WaitOutcome::Closed => break,
            }
        }
        false
    }

    async fn ship(&mut self, batch: &mut Vec<LogEvent>) {
        let len = batch.len();
        let delivery = SHIPPING.scope((), self.sink.post_batch(batch.as_slice())).await;
        self.batches += 1;

        match &delivery {
            Delivery::Delivered => {
                Counters::incr(&self.counters.batches_delivered);
                Counters::add(&self.counters.events_delivered, len);
            }
            Delivery::Rejected { .. } => {
                Counters::incr(&self.counters.batches_rejected);
                Counters::add(&self.counters.events_discarded, len);
            }
            Delivery::Failed { .. } => {
                Counters::incr(&self.counters.batches_failed);
                Counters::add(&self.counters.events_discarded, len);
            }
        }
        diagnostics::batch_outcome(&delivery, len);
        batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cell_round_trips() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ShipperState::Stopped);
        cell.set(ShipperState::Running);
        assert_eq!(cell.get(), ShipperState::Running);
        cell.set(ShipperState::Draining);
        assert_eq!(cell.get(), ShipperState::Draining);
    }

    #[tokio::test]
    async fn shipping_marker_is_scoped() {
        assert!(!is_shipping());
        let inside = SHIPPING.scope((), async { is_shipping() }).await;
        assert!(inside);
        assert!(!is_shipping());
    }
}
