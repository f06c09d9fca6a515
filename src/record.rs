use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::str::FromStr;

use crate::error::ConfigError;

/// Severity of a log event.
///
/// Variants are ordered so that minimum-level filtering is a plain
/// comparison: `Level::Warning >= Level::Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" | "FATAL" => Ok(Level::Critical),
            _ => Err(ConfigError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, <Self as TryFrom<String>>::Error> {
        s.parse()
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warning,
            _ => Level::Error,
        }
    }
}

/// Exception context attached to a record: the error's type name and its
/// rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Where a record was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub func: Option<String>,
}

/// The thread that produced a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: Option<String>,
}

impl ThreadInfo {
    pub fn current() -> Self {
        let thread = std::thread::current();
        Self {
            id: thread_id_number(thread.id()),
            name: thread.name().map(str::to_string),
        }
    }
}

// `ThreadId::as_u64` is unstable; its Debug output is `ThreadId(N)`.
fn thread_id_number(id: std::thread::ThreadId) -> u64 {
    let rendered = format!("{:?}", id);
    rendered
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// A raw log record as produced at the call site, before encoding.
///
/// Built with [`LogRecord::new`] and the chained setters; handed to
/// [`Emitter::emit`](crate::pipeline::Emitter::emit) which encodes and
/// enqueues it without blocking.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub logger: Option<String>,
    pub call_site: CallSite,
    pub thread: ThreadInfo,
    pub fields: Map<String, Value>,
    pub exception: Option<ExceptionInfo>,
    pub trace_id: Option<String>,
    pub labels: Option<BTreeMap<String, String>>,
    /// Set when `extras` failed to serialize; the encoder turns it into an
    /// [`EncodeError`](crate::error::EncodeError).
    pub(crate) fields_error: Option<crate::error::EncodeError>,
}

impl LogRecord {
    /// Create a record stamped with the current time and the caller's
    /// file and line.
    #[track_caller]
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            logger: None,
            call_site: CallSite {
                file: Some(location.file().to_string()),
                line: Some(location.line()),
                func: None,
            },
            thread: ThreadInfo::current(),
            fields: Map::new(),
            exception: None,
            trace_id: None,
            labels: None,
            fields_error: None,
        }
    }

    pub fn logger(mut self, name: impl Into<String>) -> Self {
        self.logger = Some(name.into());
        self
    }

    pub fn func(mut self, name: impl Into<String>) -> Self {
        self.call_site.func = Some(name.into());
        self
    }

    pub fn call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a single structured field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Merge a map of structured fields.
    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Merge any serializable value as structured fields. It must serialize
    /// to a JSON object; otherwise the record is dropped at encode time.
    pub fn extras<T: Serialize + ?Sized>(mut self, extras: &T) -> Self {
        use crate::error::EncodeError;

        match serde_json::to_value(extras) {
            Ok(Value::Object(map)) => self.fields.extend(map),
            Ok(other) => self.fields_error = Some(EncodeError::NotAnObject(json_kind(&other))),
            Err(e) => self.fields_error = Some(EncodeError::Fields(e.to_string())),
        }
        self
    }

    pub fn exception(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.exception = Some(ExceptionInfo::new(kind, message));
        self
    }

    /// Attach an error as exception context, using its Rust type name.
    pub fn error<E: std::error::Error>(mut self, err: &E) -> Self {
        self.exception = Some(ExceptionInfo::new(short_type_name::<E>(), err.to_string()));
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    // Strip the module path but keep generic arguments intact.
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
    }

    #[test]
    fn level_parses_aliases_case_insensitively() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::Critical);
        assert_eq!(" info ".parse::<Level>().unwrap(), Level::Info);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn level_deserializes_like_it_parses() {
        let levels: Vec<Level> = serde_json::from_str(r#"["warn", "Warning", "DEBUG", "fatal"]"#).unwrap();
        assert_eq!(levels, [Level::Warning, Level::Warning, Level::Debug, Level::Critical]);
        assert!(serde_json::from_str::<Level>(r#""verbose""#).is_err());
        assert_eq!(serde_json::to_string(&Level::Warning).unwrap(), r#""WARNING""#);
    }

    #[test]
    fn tracing_levels_map_onto_pipeline_levels() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Debug);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warning);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }

    #[test]
    fn new_captures_caller_location() {
        let record = LogRecord::new(Level::Info, "hello");
        assert_eq!(record.call_site.file.as_deref(), Some(file!()));
        assert!(record.call_site.line.is_some());
    }

    #[test]
    fn captures_producing_thread() {
        let handle = std::thread::Builder::new()
            .name("worker-7".into())
            .spawn(|| LogRecord::new(Level::Info, "from worker"))
            .unwrap();
        let record = handle.join().unwrap();
        assert_eq!(record.thread.name.as_deref(), Some("worker-7"));
        assert!(record.thread.id > 0);
    }

    #[test]
    fn extras_must_be_an_object() {
        let record = LogRecord::new(Level::Info, "x").extras(&vec![1, 2, 3]);
        assert_eq!(
            record.fields_error,
            Some(crate::error::EncodeError::NotAnObject("an array"))
        );

        #[derive(Serialize)]
        struct Extras {
            user_id: u64,
        }
        let record = LogRecord::new(Level::Info, "x").extras(&Extras { user_id: 7 });
        assert!(record.fields_error.is_none());
        assert_eq!(record.fields["user_id"], 7);
    }

    #[test]
    fn error_uses_short_type_name() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let record = LogRecord::new(Level::Error, "write failed").error(&err);
        let exc = record.exception.unwrap();
        assert_eq!(exc.kind, "Error");
        assert_eq!(exc.message, "disk gone");
    }
}
