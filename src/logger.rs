use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};

use crate::context::ContextStore;
use crate::emitter::{Emitter, JsonLinesEmitter};
use crate::errors::{Error, Result};
use crate::hook::{run_hooks, Hook, HookPolicy};
use crate::record::{LogRecord, Severity};

/// Structured logger with persistent context, one-shot staged fields, and a
/// mutating hook chain.
///
/// One instance can be shared across threads behind an `Arc`; the context
/// store, staged fields, and hook list are each guarded independently so
/// concurrent log calls never observe a torn field set.
///
/// ```no_run
/// use hooklog::{Logger, Severity};
///
/// let logger = Logger::new("api", Severity::Info);
/// logger.context().field("service", "api").unwrap();
/// logger.with_field("request_id", "req-42").unwrap().info("request accepted");
/// ```
pub struct Logger {
    name: String,
    level: RwLock<Severity>,
    context: ContextStore,
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
    staged: Mutex<IndexMap<String, Value>>,
    emitter: Arc<dyn Emitter>,
    policy: HookPolicy,
}

impl Logger {
    /// Logger emitting JSON lines to stderr, fail-soft hooks, no hooks
    /// registered. Use [`Logger::builder`] for anything else.
    pub fn new(name: impl Into<String>, level: Severity) -> Self {
        Logger::builder(name).level(level).build()
    }

    pub fn builder(name: impl Into<String>) -> LoggerBuilder {
        LoggerBuilder {
            name: name.into(),
            level: Severity::Debug,
            hooks: Vec::new(),
            emitter: None,
            policy: HookPolicy::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        *self.level.read().unwrap()
    }

    /// Change the minimum severity; effective for subsequent calls.
    pub fn set_level(&self, level: Severity) {
        *self.level.write().unwrap() = level;
    }

    /// Persistent fields merged into every record this logger builds.
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Append a hook to the chain. Effective for all subsequent log calls,
    /// not retroactive.
    pub fn add_hook(&self, hook: impl Hook + 'static) {
        self.hooks.write().unwrap().push(Arc::new(hook));
    }

    pub fn clear_hooks(&self) {
        self.hooks.write().unwrap().clear();
    }

    /// Stage a field for the next log call only. Staged fields override
    /// context fields on collision and are cleared once the call completes,
    /// whether or not it passed the severity threshold.
    ///
    /// Returns `Err` only for a value that cannot be represented as JSON.
    pub fn with_field(&self, key: impl Into<String>, value: impl Serialize) -> Result<&Self> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| Error::FieldType {
            key: key.clone(),
            source,
        })?;
        self.staged.lock().unwrap().insert(key, value);
        Ok(self)
    }

    /// Stage multiple fields for the next log call, in iteration order.
    pub fn with_fields<K, V, I>(&self, fields: I) -> Result<&Self>
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in fields {
            self.with_field(key, value)?;
        }
        Ok(self)
    }

    /// Stage error details (`error`, and `trace` when a source chain exists)
    /// for the next log call without forcing it to be an error-level event.
    pub fn err(&self, error: &(dyn std::error::Error + 'static)) -> &Self {
        let mut staged = self.staged.lock().unwrap();
        staged.insert("error".into(), Value::String(error.to_string()));

        if error.source().is_some() {
            let mut trace = error.to_string();
            let mut source = error.source();
            while let Some(cause) = source {
                trace.push_str(&format!("\ncaused by: {}", cause));
                source = cause.source();
            }
            staged.insert("trace".into(), Value::String(trace));
        }
        self
    }

    /// Log at an explicit severity using context plus staged fields.
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        self.log_with(severity, message, IndexMap::new());
    }

    /// Log with explicit call-scoped fields.
    ///
    /// Merge precedence on key collision: call fields beat staged fields
    /// beat context fields, and the first-inserted position of a key is
    /// kept. Never returns an error and never panics on behalf of a hook or
    /// the emitter; per-call failures go to stderr.
    pub fn log_with(
        &self,
        severity: Severity,
        message: impl Into<String>,
        call_fields: IndexMap<String, Value>,
    ) {
        // Staged fields are call-lifetime: drained even when the call is
        // dropped by the threshold, so they cannot leak into a later call.
        let staged = std::mem::take(&mut *self.staged.lock().unwrap());

        let threshold = *self.level.read().unwrap();
        if severity < threshold {
            return;
        }

        let mut merged_call = staged;
        for (key, value) in call_fields {
            merged_call.insert(key, value);
        }

        let mut record = LogRecord::build(
            self.name.clone(),
            severity,
            message,
            self.context.snapshot(),
            merged_call,
        );

        let hooks = self.hooks.read().unwrap().clone();
        run_hooks(&mut record, threshold, &hooks, self.policy);

        if let Err(err) = self.emitter.emit(&record) {
            eprintln!("hooklog: emit failed on logger {:?}: {}", self.name, err);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Severity::Critical, message);
    }

    /// Alias for [`critical`](Logger::critical).
    pub fn fatal(&self, message: impl Into<String>) {
        self.critical(message);
    }
}

/// Configures and builds a [`Logger`].
pub struct LoggerBuilder {
    name: String,
    level: Severity,
    hooks: Vec<Arc<dyn Hook>>,
    emitter: Option<Arc<dyn Emitter>>,
    policy: HookPolicy,
}

impl LoggerBuilder {
    pub fn level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    pub fn hook(mut self, hook: impl Hook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn hook_policy(mut self, policy: HookPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            name: self.name,
            level: RwLock::new(self.level),
            context: ContextStore::new(),
            hooks: RwLock::new(self.hooks),
            staged: Mutex::new(IndexMap::new()),
            emitter: self
                .emitter
                .unwrap_or_else(|| Arc::new(JsonLinesEmitter::stderr())),
            policy: self.policy,
        }
    }
}
