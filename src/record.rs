use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Keys with structural meaning in the emitted JSON line or the forwarded
/// document. Fields named after any of these are excluded from the extra
/// fields enumeration so they can never shadow the structural values.
pub const RESERVED_KEYS: &[&str] = &[
    "asctime",
    "name",
    "levelname",
    "message",
    "@timestamp",
    "@message",
    "level",
];

/// Log severity, ordered by increasing urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" | "FATAL" => Ok(Severity::Critical),
            other => Err(Error::InvalidLevel(other.to_string())),
        }
    }
}

/// One structured log event, built fresh per call.
///
/// `timestamp` and `severity` are fixed at construction; hooks may rewrite
/// `message` and `fields` through a [`HookContext`](crate::hook::HookContext)
/// before emission. The fields map keeps first-insertion order, so overriding
/// a key updates its value in place rather than moving it to the end.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub logger: String,
    pub message: String,
    pub fields: IndexMap<String, Value>,
}

impl LogRecord {
    /// Merge persistent context fields with call-scoped fields into a new
    /// record stamped with the current time.
    ///
    /// Context fields come first; call fields overlay them and win on key
    /// collision. Both inputs are copied, so later mutation of the caller's
    /// maps never affects an already-built record.
    pub fn build(
        logger: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        context_fields: IndexMap<String, Value>,
        call_fields: IndexMap<String, Value>,
    ) -> Self {
        let mut fields = context_fields;
        for (key, value) in call_fields {
            fields.insert(key, value);
        }

        LogRecord {
            timestamp: Utc::now(),
            severity,
            logger: logger.into(),
            message: message.into(),
            fields,
        }
    }

    /// Fields safe to display alongside the structural keys: everything in
    /// the map except entries named after a reserved key.
    pub fn extra_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
    }
}
