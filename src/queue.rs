use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::time::Instant;

use crate::event::LogEvent;
use crate::stats::Counters;

/// Create a bounded queue holding at most `capacity` events.
///
/// `capacity` must be non-zero; [`ShipperConfig::validate`](crate::config::ShipperConfig::validate)
/// guarantees this before the pipeline calls here.
pub fn bounded(capacity: usize, counters: Arc<Counters>) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        EventSender {
            tx,
            counters,
            capacity,
        },
        EventReceiver { rx },
    )
}

/// Producer side of the event queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<LogEvent>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl EventSender {
    /// Append `event` without waiting.
    ///
    /// Returns `false` when the queue is full (the incoming event is the one
    /// dropped) or when the consumer side is gone.
    pub fn try_enqueue(&self, event: LogEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                Counters::incr(&self.counters.enqueued);
                true
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                Counters::incr(&self.counters.dropped);
                false
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently buffered.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of waiting for the next event.
#[derive(Debug)]
pub enum WaitOutcome {
    Item(LogEvent),
    TimedOut,
    /// Every [`EventSender`] was dropped and the queue is empty.
    Closed,
}

/// Consumer side of the event queue. Owned by exactly one shipper loop.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<LogEvent>,
}

impl EventReceiver {
    /// Wait up to `timeout` for the next event. Cancel-safe.
    pub async fn wait_for_item(&mut self, timeout: Duration) -> WaitOutcome {
        self.wait_until(Instant::now() + timeout).await
    }

    /// Wait until `deadline` for the next event. Cancel-safe.
    pub async fn wait_until(&mut self, deadline: Instant) -> WaitOutcome {
        match tokio::time::timeout_at(deadline, self.rx.recv()).await {
            Ok(Some(event)) => WaitOutcome::Item(event),
            Ok(None) => WaitOutcome::Closed,
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    /// Move up to `n` immediately available events into `buf`, in FIFO
    /// order. Never waits. Returns how many were moved.
    pub fn drain_into(&mut self, buf: &mut Vec<LogEvent>, n: usize) -> usize {
        let mut moved = 0;
        while moved < n {
            match self.rx.try_recv() {
                Ok(event) => {
                    buf.push(event);
                    moved += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        moved
    }

    /// Remove and return up to `n` immediately available events.
    pub fn drain_up_to(&mut self, n: usize) -> Vec<LogEvent> {
        let mut out = Vec::with_capacity(n.min(64));
        self.drain_into(&mut out, n);
        out
    }
}
