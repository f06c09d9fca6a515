#![allow(dead_code)]

use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use log_shipper::{BatchSink, Delivery, Emitter, Level, LogEvent, LogRecord};
use tokio::sync::Semaphore;

/// Records every batch it receives. Optionally holds each submission until
/// a permit is added to `gate`.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<LogEvent>>>>,
    gate: Option<Arc<Semaphore>>,
    closed: Arc<Mutex<u32>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose submissions block until `gate` receives permits.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let sink = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (sink, gate)
    }

    pub fn batches(&self) -> Vec<Vec<LogEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|e| e.message().to_string())
            .collect()
    }

    pub fn close_calls(&self) -> u32 {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn post_batch(&self, batch: &[LogEvent]) -> Delivery {
        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Delivery::Failed { reason: "gate closed".into() },
            }
        }
        self.batches.lock().unwrap().push(batch.to_vec());
        Delivery::Delivered
    }

    async fn close(&self) {
        *self.closed.lock().unwrap() += 1;
    }
}

/// Answers with a scripted sequence of outcomes, then `Delivered` forever.
pub struct ScriptedSink {
    script: Mutex<Vec<Delivery>>,
    pub calls: Mutex<Vec<usize>>,
}

impl ScriptedSink {
    pub fn new(mut outcomes: Vec<Delivery>) -> Self {
        outcomes.reverse();
        Self {
            script: Mutex::new(outcomes),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BatchSink for ScriptedSink {
    async fn post_batch(&self, batch: &[LogEvent]) -> Delivery {
        self.calls.lock().unwrap().push(batch.len());
        self.script.lock().unwrap().pop().unwrap_or(Delivery::Delivered)
    }
}

/// Tries to log from inside its own submission, the way a chatty HTTP
/// client would.
#[derive(Default)]
pub struct ReentrantSink {
    pub emitter: OnceLock<Emitter>,
    pub inner_results: Mutex<Vec<bool>>,
}

#[async_trait]
impl BatchSink for ReentrantSink {
    async fn post_batch(&self, _batch: &[LogEvent]) -> Delivery {
        if let Some(emitter) = self.emitter.get() {
            let queued = emitter.emit(LogRecord::new(Level::Error, "sink is logging"));
            self.inner_results.lock().unwrap().push(queued);
        }
        Delivery::Delivered
    }
}

pub fn record(n: usize) -> LogRecord {
    LogRecord::new(Level::Info, format!("event {n}"))
}
