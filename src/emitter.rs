use serde_json::{Map, Value};
use std::io::{self, Write};
use std::sync::Mutex;

use crate::record::LogRecord;

/// Final destination for fully-hooked records.
///
/// The logger calls `emit` once per record after the hook chain finishes.
/// Implementations should be cheap; anything involving a network belongs in
/// a forwarding hook with its own background transport, not here.
pub trait Emitter: Send + Sync {
    fn emit(&self, record: &LogRecord) -> io::Result<()>;
}

/// Serialize a record into the canonical JSON line shape: the structural
/// keys `asctime`, `name`, `levelname`, `message` followed by the extra
/// fields, reserved keys suppressed.
pub fn to_json_line(record: &LogRecord) -> Value {
    let mut object = Map::new();
    object.insert("asctime".into(), Value::String(record.timestamp.to_rfc3339()));
    object.insert("name".into(), Value::String(record.logger.clone()));
    object.insert(
        "levelname".into(),
        Value::String(record.severity.as_str().to_string()),
    );
    object.insert("message".into(), Value::String(record.message.clone()));

    for (key, value) in record.extra_fields() {
        object.insert(key.to_string(), value.clone());
    }

    Value::Object(object)
}

/// Emitter that writes one JSON object per line to any [`Write`].
pub struct JsonLinesEmitter<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesEmitter<io::Stderr> {
    /// JSON lines to standard error, the default local sink.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> Emitter for JsonLinesEmitter<W> {
    fn emit(&self, record: &LogRecord) -> io::Result<()> {
        let line = to_json_line(record).to_string();
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")
    }
}

/// An emitter that drops every record.
///
/// Useful for measuring hook-chain overhead without any I/O, and for tests
/// that only care about sink-side effects.
#[derive(Clone, Default)]
pub struct NoopEmitter;

impl Emitter for NoopEmitter {
    fn emit(&self, _record: &LogRecord) -> io::Result<()> {
        Ok(())
    }
}

/// Test double that captures emitted records in memory.
#[derive(Default)]
pub struct MemoryEmitter {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Emitter for MemoryEmitter {
    fn emit(&self, record: &LogRecord) -> io::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
