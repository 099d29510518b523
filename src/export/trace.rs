//! Trace event emission for the Export Coordinator's observability. A narrow `TraceSink` trait lets callers route events either
//! to `tracing` (the normal case) or into an in-memory buffer for tests and
//! tooling that want to assert on the exact sequence emitted.

use parking_lot::Mutex;

/// A single coordinator-emitted trace event, e.g. `export.begin`,
/// `render.video.progress`, `render.compile.end`.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRecord {
    pub event: String,
    pub fields: Vec<(String, String)>,
}

impl TraceRecord {
    pub fn new(event: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self { event: event.into(), fields }
    }
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, record: TraceRecord);
}

/// Forwards every record to `tracing::info!` under the `export` target, with
/// fields rendered as `key=value` pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTraceSink;

impl TraceSink for TracingTraceSink {
    fn emit(&self, record: TraceRecord) {
        let fields = record
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "export", event = %record.event, "{} {}", record.event, fields);
    }
}

/// Buffers every record behind a lock, for tests that want to inspect the
/// exact trace sequence a coordinator run produced.
#[derive(Default)]
pub struct InMemoryTraceSink {
    records: Mutex<Vec<TraceRecord>>,
}

impl InMemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.event.clone()).collect()
    }
}

impl TraceSink for InMemoryTraceSink {
    fn emit(&self, record: TraceRecord) {
        self.records.lock().push(record);
    }
}

/// Convenience helper: emits an event with no fields.
pub fn emit(sink: &dyn TraceSink, event: &str) {
    sink.emit(TraceRecord::new(event, Vec::new()));
}

/// Convenience helper: emits an event with `field=value` pairs.
pub fn emit_with(sink: &dyn TraceSink, event: &str, fields: &[(&str, String)]) {
    sink.emit(TraceRecord::new(
        event,
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    ));
}
