use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::env::{self, env_parse, env_parse_with};
use crate::error::ConfigError;
use crate::record::Level;

/// Configuration of a [`LogShipper`](crate::pipeline::LogShipper).
///
/// **Fields**
/// - `ingest_url`: endpoint receiving `POST` requests with a JSON array body.
/// - `service_name`: stamped on every event as `service.name`.
/// - `min_level`: events below it are filtered out before encoding.
/// - `batch_size`: maximum events per request; a full batch ships at once.
/// - `flush_interval`: how long the shipper waits for the next event
///   before shipping whatever it holds.
/// - `timeout`: total time allowed for one request.
/// - `max_connections` / `max_idle_connections` / `idle_timeout`: HTTP pool
///   bounds.
/// - `queue_capacity`: events buffered before new ones are dropped.
/// - `headers`: static headers sent with every request (auth tokens etc).
/// - `verify_tls`: set to `false` to accept invalid certificates.
/// - `extra_fields`: static structured fields merged into every event.
/// - `shutdown_timeout`: optional deadline for the whole drain on `stop()`.
///
/// Deserializes from a host config file with durations written as
/// fractional seconds (`flush_interval_secs = 0.5`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    pub ingest_url: String,
    pub service_name: String,
    pub min_level: Level,
    pub batch_size: usize,
    #[serde(rename = "flush_interval_secs", deserialize_with = "secs")]
    pub flush_interval: Duration,
    #[serde(rename = "timeout_secs", deserialize_with = "secs")]
    pub timeout: Duration,
    pub max_connections: usize,
    pub max_idle_connections: usize,
    #[serde(rename = "idle_timeout_secs", deserialize_with = "secs")]
    pub idle_timeout: Duration,
    pub queue_capacity: usize,
    pub headers: BTreeMap<String, String>,
    pub verify_tls: bool,
    pub extra_fields: Map<String, Value>,
    #[serde(rename = "shutdown_timeout_secs", deserialize_with = "opt_secs")]
    pub shutdown_timeout: Option<Duration>,
}

pub const DEFAULT_INGEST_URL: &str = "http://localhost:8080/ingest";
pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 10;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            service_name: "app".to_string(),
            min_level: Level::Info,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            headers: BTreeMap::new(),
            verify_tls: true,
            extra_fields: Map::new(),
            shutdown_timeout: None,
        }
    }
}

impl ShipperConfig {
    pub fn new(ingest_url: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            ingest_url: ingest_url.into(),
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_extra_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Check the numeric settings. The ingest URL and headers are checked
    /// when the HTTP transport is built in `start()`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        if self.max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooManyConnections(self.max_connections));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::InvalidDuration("flush_interval"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidDuration("timeout"));
        }
        if matches!(self.shutdown_timeout, Some(d) if d.is_zero()) {
            return Err(ConfigError::InvalidDuration("shutdown_timeout"));
        }
        Ok(())
    }

    /// Build a configuration from `LOG_SHIPPER_*` environment variables
    /// (see [`crate::env`]), using defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::new(
            env::env_or(env::LOG_SHIPPER_INGEST_URL_ENV, DEFAULT_INGEST_URL),
            env::env_or(env::LOG_SHIPPER_SERVICE_NAME_ENV, "app"),
        );

        if let Some(level) = env_parse_with(env::LOG_SHIPPER_MIN_LEVEL_ENV, |raw| raw.parse().ok())? {
            cfg.min_level = level;
        }
        if let Some(n) = env_parse(env::LOG_SHIPPER_BATCH_SIZE_ENV)? {
            cfg.batch_size = n;
        }
        if let Some(d) = env_parse_with(env::LOG_SHIPPER_FLUSH_INTERVAL_SECS_ENV, parse_secs)? {
            cfg.flush_interval = d;
        }
        if let Some(d) = env_parse_with(env::LOG_SHIPPER_TIMEOUT_SECS_ENV, parse_secs)? {
            cfg.timeout = d;
        }
        if let Some(n) = env_parse(env::LOG_SHIPPER_MAX_CONNECTIONS_ENV)? {
            cfg.max_connections = n;
        }
        if let Some(n) = env_parse(env::LOG_SHIPPER_MAX_IDLE_CONNECTIONS_ENV)? {
            cfg.max_idle_connections = n;
        }
        if let Some(d) = env_parse_with(env::LOG_SHIPPER_IDLE_TIMEOUT_SECS_ENV, parse_secs)? {
            cfg.idle_timeout = d;
        }
        if let Some(n) = env_parse(env::LOG_SHIPPER_QUEUE_CAPACITY_ENV)? {
            cfg.queue_capacity = n;
        }
        if let Some(v) = env_parse_with(env::LOG_SHIPPER_VERIFY_TLS_ENV, env::parse_bool)? {
            cfg.verify_tls = v;
        }
        cfg.shutdown_timeout =
            env_parse_with(env::LOG_SHIPPER_SHUTDOWN_TIMEOUT_SECS_ENV, parse_secs)?;
        if let Some(pairs) = env_parse_with(env::LOG_SHIPPER_HEADERS_ENV, env::parse_pairs)? {
            cfg.headers.extend(pairs);
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_secs(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

fn opt_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    match Option::<f64>::deserialize(deserializer)? {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
