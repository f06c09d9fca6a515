use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::ShipperConfig;
use crate::diagnostics::truncate_body;
use crate::error::{ConfigError, ShipperError};
use crate::event::LogEvent;
use crate::sink::{BatchSink, Delivery};

/// [`BatchSink`] that POSTs each batch as a JSON array to an ingest URL.
///
/// One request per batch, no retries. The underlying reqwest client keeps
/// at most `max_idle_connections` idle keep-alive connections for
/// `idle_timeout`, and a semaphore caps in-flight requests at
/// `max_connections`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
    permits: Arc<Semaphore>,
}

impl HttpTransport {
    /// Build a transport from the pipeline configuration.
    ///
    /// **Returns**
    /// - `Err(ShipperError::Config(..))` for an unparsable or non-http(s)
    ///   ingest URL, or a header that is not valid HTTP.
    /// - `Err(ShipperError::Client(..))` if the TLS backend fails to
    ///   initialize.
    pub fn new(config: &ShipperConfig) -> Result<Self, ShipperError> {
        let url = parse_ingest_url(&config.ingest_url)?;
        let headers = build_headers(&config.headers)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .pool_idle_timeout(config.idle_timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url,
            permits: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Parse the ingest URL, ignoring surrounding whitespace and trailing
/// slashes.
pub(crate) fn parse_ingest_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim().trim_end_matches('/')).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn build_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(name.clone()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ConfigError::InvalidHeaderValue(name.clone()))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[async_trait]
impl BatchSink for HttpTransport {
    async fn post_batch(&self, batch: &[LogEvent]) -> Delivery {
        let body = match serde_json::to_vec(batch) {
            Ok(body) => body,
            Err(e) => {
                return Delivery::Failed {
                    reason: format!("failed to serialize batch: {e}"),
                }
            }
        };

        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Delivery::Failed {
                    reason: "transport is closed".to_string(),
                }
            }
        };

        let resp = match self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                return Delivery::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let status = resp.status();
        if status.is_success() {
            // Read the body so the connection can go back to the pool.
            let _ = resp.bytes().await;
            Delivery::Delivered
        } else {
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Delivery::Rejected {
                status: status.as_u16(),
                body: truncate_body(text),
            }
        }
    }

    async fn close(&self) {
        self.permits.close();
    }
}
