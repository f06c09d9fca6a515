use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::EncodeError;
use crate::event::LogEvent;
use crate::record::LogRecord;

/// Keys the encoder owns inside `fields`. Caller extras and static extras
/// with these names are discarded so they cannot mask diagnostic data.
pub const RESERVED_FIELD_KEYS: [&str; 5] = ["logger", "process", "thread", "source", "exception"];

const ROOT_LOGGER: &str = "root";

/// Turns raw [`LogRecord`]s into immutable [`LogEvent`]s.
///
/// Holds only data fixed at construction (service name, process id,
/// static extras), so `encode` is pure and safe to call from any thread.
#[derive(Debug, Clone)]
pub struct Encoder {
    service_name: Arc<str>,
    pid: u32,
    static_fields: Map<String, Value>,
}

impl Encoder {
    pub fn new(service_name: impl Into<String>, static_fields: Map<String, Value>) -> Self {
        let service_name: String = service_name.into();
        Self {
            service_name: Arc::from(service_name),
            pid: std::process::id(),
            static_fields,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Encode a record.
    ///
    /// Field precedence, lowest to highest: static extras, caller extras,
    /// fixed diagnostic keys (`logger`, `process`, `thread`, `source`,
    /// `exception`).
    pub fn encode(&self, record: LogRecord) -> Result<LogEvent, EncodeError> {
        if let Some(err) = record.fields_error {
            return Err(err);
        }

        let mut fields = Map::with_capacity(
            self.static_fields.len() + record.fields.len() + RESERVED_FIELD_KEYS.len(),
        );
        let extras = self.static_fields.iter().map(|(k, v)| (k.clone(), v.clone()));
        for (key, value) in extras.chain(record.fields) {
            if !is_reserved(&key) {
                fields.insert(key, value);
            }
        }

        fields.insert(
            "logger".to_string(),
            Value::String(record.logger.unwrap_or_else(|| ROOT_LOGGER.to_string())),
        );
        fields.insert("process".to_string(), json!({ "pid": self.pid }));
        fields.insert(
            "thread".to_string(),
            json!({ "id": record.thread.id, "name": record.thread.name }),
        );
        fields.insert(
            "source".to_string(),
            json!({
                "file": record.call_site.file,
                "line": record.call_site.line,
                "func": record.call_site.func,
            }),
        );

        Ok(LogEvent {
            timestamp: record.timestamp,
            level: record.level,
            service_name: Arc::clone(&self.service_name),
            message: record.message,
            fields,
            exception: record.exception,
            trace_id: record.trace_id,
            labels: record.labels,
        })
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_FIELD_KEYS.contains(&key)
}
