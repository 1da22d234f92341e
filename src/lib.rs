pub mod context;
pub mod emitter;
pub mod env;
pub mod errors;
pub mod hook;
pub mod logger;
pub mod record;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

pub use context::ContextStore;
pub use emitter::{Emitter, JsonLinesEmitter, MemoryEmitter, NoopEmitter};
pub use errors::{BoxError, Error, Result};
pub use hook::{Hook, HookContext, HookPolicy};
pub use logger::{Logger, LoggerBuilder};
pub use record::{LogRecord, Severity, RESERVED_KEYS};

#[cfg(feature = "elasticsearch")]
pub use elasticsearch::{DocumentTransport, ElasticsearchConfig, ElasticsearchHook};
