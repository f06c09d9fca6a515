use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ShipperConfig;
use crate::diagnostics;
use crate::encoder::Encoder;
use crate::error::{ConfigError, ShipperError};
use crate::queue::{self, EventReceiver, EventSender};
use crate::record::{Level, LogRecord};
use crate::shipper::{self, ShipperLoop, ShipperState, StateCell};
use crate::sink::BatchSink;
use crate::stats::{Counters, ShipperStats};

/// Producer handle: encodes records and enqueues them without blocking.
///
/// Cheap to clone; hand one to every component (or to
/// [`IngestLayer`](crate::layer::IngestLayer)) that needs to log.
#[derive(Debug, Clone)]
pub struct Emitter {
    encoder: Arc<Encoder>,
    sender: EventSender,
    counters: Arc<Counters>,
    min_level: Level,
}

impl Emitter {
    /// Fire-and-forget. Never blocks beyond a `try_send` and never panics.
    ///
    /// **Returns**
    /// - `true` if the event was queued for shipping.
    /// - `false` if it was below the minimum level, emitted from inside a
    ///   batch submission, failed to encode, or hit a full queue.
    pub fn emit(&self, record: LogRecord) -> bool {
        Counters::incr(&self.counters.emitted);

        if record.level < self.min_level {
            Counters::incr(&self.counters.filtered);
            return false;
        }
        if shipper::is_shipping() {
            Counters::incr(&self.counters.suppressed);
            return false;
        }

        match self.encoder.encode(record) {
            Ok(event) => self.sender.try_enqueue(event),
            Err(_) => {
                Counters::incr(&self.counters.encode_failures);
                false
            }
        }
    }

    /// Whether a record at `level` would pass the minimum-level filter.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    pub(crate) fn count_filtered(&self) {
        Counters::incr(&self.counters.emitted);
        Counters::incr(&self.counters.filtered);
    }

    pub fn stats(&self) -> ShipperStats {
        self.counters.snapshot()
    }

    /// Events currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

enum SinkSource {
    Http,
    Custom(Arc<dyn BatchSink>),
}

enum Lifecycle {
    /// Not running; holds the consumer side so events emitted now are
    /// buffered for the next start.
    Idle(EventReceiver),
    Running {
        cancel: CancellationToken,
        task: JoinHandle<EventReceiver>,
    },
    /// The consumer side was lost to a forced shutdown.
    Closed,
}

/// Lifecycle controller for the log-shipping pipeline.
///
/// Construct one at process startup, keep it in the host's composition
/// root, call [`start`](Self::start) once the tokio runtime is up and
/// [`stop`](Self::stop) during shutdown. Records can be emitted at any
/// time; before `start` they wait in the queue.
pub struct LogShipper {
    config: ShipperConfig,
    emitter: Emitter,
    sink: SinkSource,
    state: Arc<StateCell>,
    lifecycle: Mutex<Lifecycle>,
}

impl LogShipper {
    /// Create a pipeline that ships to `config.ingest_url` over HTTP.
    pub fn new(config: ShipperConfig) -> Result<Self, ConfigError> {
        Self::build(config, SinkSource::Http)
    }

    /// Create a pipeline that hands batches to a custom [`BatchSink`]
    /// instead of the built-in HTTP transport.
    pub fn with_sink(config: ShipperConfig, sink: Arc<dyn BatchSink>) -> Result<Self, ConfigError> {
        Self::build(config, SinkSource::Custom(sink))
    }

    fn build(config: ShipperConfig, sink: SinkSource) -> Result<Self, ConfigError> {
        config.validate()?;

        let counters = Arc::new(Counters::default());
        let (sender, receiver) = queue::bounded(config.queue_capacity, Arc::clone(&counters));
        let encoder = Encoder::new(config.service_name.clone(), config.extra_fields.clone());

        let emitter = Emitter {
            encoder: Arc::new(encoder),
            sender,
            counters,
            min_level: config.min_level,
        };

        Ok(Self {
            config,
            emitter,
            sink,
            state: Arc::new(StateCell::new()),
            lifecycle: Mutex::new(Lifecycle::Idle(receiver)),
        })
    }

    /// Spawn the shipper loop on the current tokio runtime.
    ///
    /// Calling it while already running is a no-op.
    ///
    /// **Returns**
    /// - `Err(ShipperError::NoRuntime)` outside a tokio runtime.
    /// - `Err(ShipperError::Config(..))` if the ingest URL or headers are
    ///   invalid; the pipeline stays stopped and can be retried.
    /// - `Err(ShipperError::Closed)` after a forced shutdown.
    pub async fn start(&self) -> Result<(), ShipperError> {
        let runtime = current_runtime()?;
        let mut lifecycle = self.lifecycle.lock().await;

        let queue = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Idle(queue) => queue,
            Lifecycle::Running { cancel, task } => {
                *lifecycle = Lifecycle::Running { cancel, task };
                return Ok(());
            }
            Lifecycle::Closed => return Err(ShipperError::Closed),
        };

        let sink = match self.make_sink() {
            Ok(sink) => sink,
            Err(e) => {
                *lifecycle = Lifecycle::Idle(queue);
                return Err(e);
            }
        };

        let shipper = ShipperLoop::new(
            queue,
            sink,
            self.config.batch_size,
            self.config.flush_interval,
            Arc::clone(&self.emitter.counters),
            Arc::clone(&self.state),
        );

        let cancel = CancellationToken::new();
        self.state.set(ShipperState::Running);
        let task = runtime.spawn(shipper.run(cancel.clone()));
        *lifecycle = Lifecycle::Running { cancel, task };

        diagnostics::started(
            &self.config.service_name,
            self.config.batch_size,
            self.config.flush_interval.as_millis(),
        );
        Ok(())
    }

    /// Stop accepting new batching cycles, ship everything still queued,
    /// and release the transport.
    ///
    /// No-op if the pipeline is not running. Waits for the drain to finish,
    /// or at most `shutdown_timeout` when one is configured; on timeout the
    /// loop is aborted and the pipeline cannot be started again.
    pub async fn stop(&self) -> ShipperStats {
        let mut lifecycle = self.lifecycle.lock().await;

        let (cancel, mut task) = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
            Lifecycle::Running { cancel, task } => (cancel, task),
            other => {
                *lifecycle = other;
                return self.stats();
            }
        };

        cancel.cancel();
        let joined = match self.config.shutdown_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    diagnostics::forced_shutdown(limit.as_millis());
                    self.state.set(ShipperState::Stopped);
                    return self.stats();
                }
            },
            None => (&mut task).await,
        };

        match joined {
            Ok(queue) => *lifecycle = Lifecycle::Idle(queue),
            Err(e) => diagnostics::loop_crashed(&e),
        }
        self.state.set(ShipperState::Stopped);
        self.stats()
    }

    fn make_sink(&self) -> Result<Arc<dyn BatchSink>, ShipperError> {
        match &self.sink {
            SinkSource::Custom(sink) => Ok(Arc::clone(sink)),
            #[cfg(feature = "http")]
            SinkSource::Http => {
                let transport = crate::transport::HttpTransport::new(&self.config)?;
                Ok(Arc::new(transport))
            }
            #[cfg(not(feature = "http"))]
            SinkSource::Http => Err(ConfigError::HttpFeatureDisabled.into()),
        }
    }

    /// Encode and enqueue `record`. See [`Emitter::emit`].
    pub fn emit(&self, record: LogRecord) -> bool {
        self.emitter.emit(record)
    }

    /// A clonable producer handle sharing this pipeline's queue.
    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    pub fn state(&self) -> ShipperState {
        self.state.get()
    }

    pub fn stats(&self) -> ShipperStats {
        self.emitter.stats()
    }

    pub fn config(&self) -> &ShipperConfig {
        &self.config
    }
}

fn current_runtime() -> Result<tokio::runtime::Handle, ShipperError> {
    tokio::runtime::Handle::try_current().map_err(|_| ShipperError::NoRuntime)
}

impl Drop for LogShipper {
    fn drop(&mut self) {
        // Dropped without `stop()`: let the loop drain in the background.
        if let Lifecycle::Running { cancel, .. } = self.lifecycle.get_mut() {
            cancel.cancel();
        }
    }
}
