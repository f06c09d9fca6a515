use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::diagnostics::SIDE_CHANNEL_TARGET;
use crate::pipeline::Emitter;
use crate::record::{CallSite, ExceptionInfo, Level, LogRecord};

/// Target prefixes never forwarded by default: the shipper's own side
/// channel and the HTTP stack it drives.
pub const DEFAULT_IGNORED_TARGETS: [&str; 6] =
    [SIDE_CHANNEL_TARGET, "hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Field carrying the trace correlation id.
pub const TRACE_ID_FIELD: &str = "trace_id";
/// Prefix marking a field as a top-level label, e.g. `label.team = "core"`.
pub const LABEL_PREFIX: &str = "label.";
/// Optional override for the exception type of a `record_error` field.
pub const ERROR_TYPE_FIELD: &str = "error.kind";

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// hands them to an [`Emitter`].
///
/// Only events at or above the pipeline's minimum level are encoded.
/// Everything happens synchronously inside `on_event` up to a `try_send`;
/// network I/O is left to the shipper loop.
///
/// The shipper's own diagnostics (rejected or failed batches, forced
/// shutdown) are `tracing` events on [`SIDE_CHANNEL_TARGET`], which this
/// layer never ships. Without a `fmt` layer next to it nobody prints them;
/// enable [`report_side_channel`](Self::report_side_channel) in that case
/// to get warnings and errors on stderr.
pub struct IngestLayer {
    emitter: Emitter,
    ignored_targets: Vec<String>,
    report_side_channel: bool,
    /// Total events seen by the layer (before any filtering).
    pub seen_events: Arc<AtomicU64>,
    /// Skipped because their target is ignored.
    pub ignored_events: Arc<AtomicU64>,
    /// Side channel events written to stderr.
    pub reported_events: Arc<AtomicU64>,
}

impl IngestLayer {
    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            ignored_targets: DEFAULT_IGNORED_TARGETS.iter().map(|t| t.to_string()).collect(),
            report_side_channel: false,
            seen_events: Arc::new(AtomicU64::new(0)),
            ignored_events: Arc::new(AtomicU64::new(0)),
            reported_events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Print side channel warnings and errors to stderr.
    pub fn report_side_channel(mut self, enabled: bool) -> Self {
        self.report_side_channel = enabled;
        self
    }

    /// Also skip events whose target starts with `prefix`.
    pub fn ignore_target(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_targets.push(prefix.into());
        self
    }

    fn report_to_stderr(&self, event: &Event<'_>) {
        let meta = event.metadata();
        if meta.target() != SIDE_CHANNEL_TARGET || Level::from(*meta.level()) < Level::Warning {
            return;
        }

        let mut captured = Captured::default();
        event.record(&mut FieldVisitor { captured: &mut captured });
        eprintln!(
            "[log_shipper] {} {} {}",
            meta.level(),
            captured.message.unwrap_or_default(),
            Value::Object(captured.fields)
        );
        self.reported_events.fetch_add(1, Ordering::Relaxed);
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|prefix| {
            target == prefix
                || (target.starts_with(prefix.as_str())
                    && target[prefix.len()..].starts_with("::"))
        })
    }
}

impl<S> Layer<S> for IngestLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.seen_events.fetch_add(1, Ordering::Relaxed);

        let meta = event.metadata();
        if self.is_ignored(meta.target()) {
            self.ignored_events.fetch_add(1, Ordering::Relaxed);
            if self.report_side_channel {
                self.report_to_stderr(event);
            }
            return;
        }

        let level = Level::from(*meta.level());
        if !self.emitter.enabled(level) {
            self.emitter.count_filtered();
            return;
        }

        let mut captured = Captured::default();
        event.record(&mut FieldVisitor { captured: &mut captured });

        if let Some(span) = ctx.lookup_current() {
            captured
                .fields
                .insert("span".to_string(), json!({ "name": span.name() }));
        }

        let exception = captured.error.map(|(field, message)| {
            let kind = captured.error_type.unwrap_or(field);
            ExceptionInfo::new(kind, message)
        });

        let mut record = LogRecord::new(level, captured.message.unwrap_or_default())
            .logger(meta.target())
            .call_site(CallSite {
                file: meta.file().map(str::to_string),
                line: meta.line(),
                func: meta.module_path().map(str::to_string),
            })
            .fields(captured.fields);
        record.exception = exception;
        record.trace_id = captured.trace_id;
        if !captured.labels.is_empty() {
            record.labels = Some(captured.labels);
        }

        self.emitter.emit(record);
    }
}

#[derive(Default)]
struct Captured {
    message: Option<String>,
    trace_id: Option<String>,
    labels: BTreeMap<String, String>,
    /// `(field name, rendered error)` of the last `record_error` field.
    error: Option<(String, String)>,
    error_type: Option<String>,
    fields: Map<String, Value>,
}

struct FieldVisitor<'a> {
    captured: &'a mut Captured,
}

impl FieldVisitor<'_> {
    fn insert_text(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.captured.message = Some(value);
        } else if name == TRACE_ID_FIELD {
            self.captured.trace_id = Some(value);
        } else if name == ERROR_TYPE_FIELD {
            self.captured.error_type = Some(value);
        } else if let Some(label) = name.strip_prefix(LABEL_PREFIX) {
            self.captured.labels.insert(label.to_string(), value);
        } else {
            self.captured.fields.insert(name.to_string(), Value::String(value));
        }
    }

    fn insert_value(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if let Some(label) = name.strip_prefix(LABEL_PREFIX) {
            self.captured.labels.insert(label.to_string(), value.to_string());
        } else if name == TRACE_ID_FIELD {
            self.captured.trace_id = Some(value.to_string());
        } else {
            self.captured.fields.insert(name.to_string(), value);
        }
    }
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert_text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert_value(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert_value(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert_value(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert_value(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.captured.error = Some((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert_text(field, format!("{:?}", value));
    }
}
