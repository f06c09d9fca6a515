use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::record::{ExceptionInfo, Level};

/// A normalized, transport-ready log event.
///
/// Produced by the [`Encoder`](crate::encoder::Encoder) and never mutated
/// afterwards: fields are private and only exposed through accessors.
/// Serializes to the ingest wire shape:
///
/// ```json
/// {
///   "@timestamp": "2024-01-01T00:00:00.000Z",
///   "service": {"name": "api"},
///   "log": {"level": "INFO"},
///   "message": "text",
///   "fields": {"logger": "...", "process": {"pid": 1}, "exception": {...}},
///   "trace": {"id": "..."},
///   "labels": {"k": "v"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) level: Level,
    pub(crate) service_name: Arc<str>,
    pub(crate) message: String,
    pub(crate) fields: Map<String, Value>,
    pub(crate) exception: Option<ExceptionInfo>,
    pub(crate) trace_id: Option<String>,
    pub(crate) labels: Option<BTreeMap<String, String>>,
}

impl LogEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.labels.as_ref()
    }
}

/// Millisecond precision, always `Z`.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
struct Named<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct LevelObj {
    level: Level,
}

#[derive(Serialize)]
struct TraceObj<'a> {
    id: &'a str,
}

/// `fields` plus the exception folded in under `exception`, without
/// cloning the map.
struct FieldsWithException<'a> {
    fields: &'a Map<String, Value>,
    exception: Option<&'a ExceptionInfo>,
}

impl Serialize for FieldsWithException<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (k, v) in self.fields {
            if self.exception.is_some() && k == "exception" {
                continue;
            }
            map.serialize_entry(k, v)?;
        }
        if let Some(exc) = self.exception {
            map.serialize_entry("exception", exc)?;
        }
        map.end()
    }
}

impl Serialize for LogEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let with_fields = !self.fields.is_empty() || self.exception.is_some();
        let len = 4
            + usize::from(with_fields)
            + usize::from(self.trace_id.is_some())
            + usize::from(self.labels.is_some());

        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("@timestamp", &format_timestamp(&self.timestamp))?;
        map.serialize_entry("service", &Named { name: &self.service_name })?;
        map.serialize_entry("log", &LevelObj { level: self.level })?;
        map.serialize_entry("message", &self.message)?;
        if with_fields {
            map.serialize_entry(
                "fields",
                &FieldsWithException {
                    fields: &self.fields,
                    exception: self.exception.as_ref(),
                },
            )?;
        }
        if let Some(id) = &self.trace_id {
            map.serialize_entry("trace", &TraceObj { id })?;
        }
        if let Some(labels) = &self.labels {
            map.serialize_entry("labels", labels)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn event() -> LogEvent {
        LogEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            level: Level::Info,
            service_name: Arc::from("api"),
            message: "text".to_string(),
            fields: Map::new(),
            exception: None,
            trace_id: None,
            labels: None,
        }
    }

    #[test]
    fn serializes_minimal_wire_shape() {
        let value = serde_json::to_value(event()).unwrap();
        assert_eq!(
            value,
            json!({
                "@timestamp": "2024-01-01T00:00:00.000Z",
                "service": {"name": "api"},
                "log": {"level": "INFO"},
                "message": "text",
            })
        );
    }

    #[test]
    fn serializes_optional_parts() {
        let mut ev = event();
        ev.fields.insert("logger".into(), json!("app.db"));
        ev.exception = Some(ExceptionInfo::new("TimeoutError", "took too long"));
        ev.trace_id = Some("abc123".into());
        ev.labels = Some(BTreeMap::from([("env".to_string(), "prod".to_string())]));

        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["fields"]["logger"], "app.db");
        assert_eq!(
            value["fields"]["exception"],
            json!({"type": "TimeoutError", "message": "took too long"})
        );
        assert_eq!(value["trace"], json!({"id": "abc123"}));
        assert_eq!(value["labels"], json!({"env": "prod"}));
    }

    #[test]
    fn timestamp_keeps_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
            + chrono::Duration::milliseconds(42);
        assert_eq!(format_timestamp(&ts), "2024-05-06T07:08:09.042Z");
    }
}
