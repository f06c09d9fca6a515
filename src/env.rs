//! Environment variable names read by [`ShipperConfig::from_env`](crate::config::ShipperConfig::from_env).
//!
//! These are purely helpers; the pipeline itself never touches the
//! environment.

use std::str::FromStr;

use crate::error::ConfigError;

/// Ingest endpoint, e.g. `http://127.0.0.1:8080/ingest`.
pub const LOG_SHIPPER_INGEST_URL_ENV: &str = "LOG_SHIPPER_INGEST_URL";

/// Logical service name stamped on every event.
pub const LOG_SHIPPER_SERVICE_NAME_ENV: &str = "LOG_SHIPPER_SERVICE_NAME";

/// Minimum level, e.g. `info` or `WARNING`.
pub const LOG_SHIPPER_MIN_LEVEL_ENV: &str = "LOG_SHIPPER_MIN_LEVEL";

pub const LOG_SHIPPER_BATCH_SIZE_ENV: &str = "LOG_SHIPPER_BATCH_SIZE";

/// Fractional seconds.
pub const LOG_SHIPPER_FLUSH_INTERVAL_SECS_ENV: &str = "LOG_SHIPPER_FLUSH_INTERVAL_SECS";

/// Fractional seconds.
pub const LOG_SHIPPER_TIMEOUT_SECS_ENV: &str = "LOG_SHIPPER_TIMEOUT_SECS";

pub const LOG_SHIPPER_MAX_CONNECTIONS_ENV: &str = "LOG_SHIPPER_MAX_CONNECTIONS";

pub const LOG_SHIPPER_MAX_IDLE_CONNECTIONS_ENV: &str = "LOG_SHIPPER_MAX_IDLE_CONNECTIONS";

/// Fractional seconds.
pub const LOG_SHIPPER_IDLE_TIMEOUT_SECS_ENV: &str = "LOG_SHIPPER_IDLE_TIMEOUT_SECS";

pub const LOG_SHIPPER_QUEUE_CAPACITY_ENV: &str = "LOG_SHIPPER_QUEUE_CAPACITY";

/// `true`/`false`, `1`/`0`.
pub const LOG_SHIPPER_VERIFY_TLS_ENV: &str = "LOG_SHIPPER_VERIFY_TLS";

/// Fractional seconds; unset means no overall shutdown deadline.
pub const LOG_SHIPPER_SHUTDOWN_TIMEOUT_SECS_ENV: &str = "LOG_SHIPPER_SHUTDOWN_TIMEOUT_SECS";

/// Comma separated `name=value` pairs.
pub const LOG_SHIPPER_HEADERS_ENV: &str = "LOG_SHIPPER_HEADERS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an optional environment variable. Unset or empty yields
/// `Ok(None)`; a value that fails to parse is an error naming the key.
pub fn env_parse<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    env_parse_with(key, |raw| raw.parse().ok())
}

pub(crate) fn env_parse_with<T>(
    key: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => parse(raw.trim()).map(Some).ok_or(ConfigError::InvalidEnv { key, value: raw }),
        Err(_) => Ok(None),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `a=1,b=2` into pairs. Whitespace around names and values is
/// trimmed; an entry without `=` fails the whole parse.
pub(crate) fn parse_pairs(raw: &str) -> Option<Vec<(String, String)>> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (name, value) = entry.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parses_header_pairs() {
        let pairs = parse_pairs("authorization=Bearer abc, x-tenant = t1,").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("authorization".to_string(), "Bearer abc".to_string()),
                ("x-tenant".to_string(), "t1".to_string()),
            ]
        );
        assert!(parse_pairs("broken").is_none());
    }
}
