use thiserror::Error;

/// Boxed error used across hook and transport boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced to the caller.
///
/// Only construction-time misuse propagates: bad sink configuration, a field
/// value that cannot be represented as JSON, or an unparseable level name.
/// Per-call failures (a hook erroring, the index endpoint being down) are
/// reported on stderr and never returned from a log call.
#[derive(Debug, Error)]
pub enum Error {
    /// Sink configuration could not be resolved from arguments or environment.
    #[error("invalid sink configuration: {reason}")]
    Configuration { reason: String },

    /// A field value was not JSON-serializable. Raised at the `field()` call,
    /// not deferred into the pipeline.
    #[error("field {key:?} has an unsupported value type")]
    FieldType {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A level name failed to parse.
    #[error("invalid log level: {0:?}")]
    InvalidLevel(String),
}

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
