/// Error type returned when a [`ShipperConfig`](crate::config::ShipperConfig)
/// cannot be turned into a working pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid ingest url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported ingest url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0:?}")]
    InvalidHeaderValue(String),

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("max_connections must be at least 1")]
    ZeroConnections,

    #[error("max_connections {0} exceeds the limit of {max}", max = tokio::sync::Semaphore::MAX_PERMITS)]
    TooManyConnections(usize),

    #[error("{0} must be a positive, finite duration")]
    InvalidDuration(&'static str),

    #[error("unknown log level {0:?}")]
    InvalidLevel(String),

    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("http feature is not enabled")]
    HttpFeatureDisabled,
}

/// Raised when a [`LogRecord`](crate::record::LogRecord) cannot be encoded.
///
/// Never surfaces to `emit` callers; the record is dropped and counted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("structured fields could not be serialized: {0}")]
    Fields(String),

    #[error("structured fields must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Error type returned by the lifecycle operations of
/// [`LogShipper`](crate::pipeline::LogShipper) and by [`crate::init`].
#[derive(thiserror::Error, Debug)]
pub enum ShipperError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no tokio runtime is running; start() must be called from within one")]
    NoRuntime,

    #[error("pipeline was force-closed and cannot be restarted")]
    Closed,

    #[cfg(feature = "http")]
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}
