use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::errors::{BoxError, Error, Result};
use crate::record::{LogRecord, Severity};

/// Mutable view of a record-in-progress handed to each hook.
///
/// Hooks may rewrite the message and add, change, or delete fields. Severity,
/// timestamp, and logger name are fixed at record construction and only
/// readable here.
pub struct HookContext<'a> {
    record: &'a mut LogRecord,
    logger_level: Severity,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(record: &'a mut LogRecord, logger_level: Severity) -> Self {
        Self {
            record,
            logger_level,
        }
    }

    /// Severity of the current record.
    pub fn severity(&self) -> Severity {
        self.record.severity
    }

    /// Threshold of the logger that built this record.
    pub fn logger_level(&self) -> Severity {
        self.logger_level
    }

    pub fn logger_name(&self) -> &str {
        &self.record.logger
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    pub fn message(&self) -> &str {
        &self.record.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.record.message = message.into();
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.record.fields
    }

    /// Set or overwrite a field. The value is converted to JSON here, so a
    /// bad value fails inside the offending hook instead of at emission.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| Error::FieldType {
            key: key.clone(),
            source,
        })?;
        self.record.fields.insert(key, value);
        Ok(())
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.record.fields.shift_remove(key)
    }
}

/// A pipeline stage run once per record, in registration order.
///
/// Both callable structs and plain functions fit: any
/// `Fn(&mut HookContext) -> Result<(), BoxError>` is a hook through the
/// blanket impl.
///
/// ```
/// use hooklog::{BoxError, HookContext};
///
/// fn redact_token(ctx: &mut HookContext<'_>) -> Result<(), BoxError> {
///     ctx.remove_field("auth_token");
///     Ok(())
/// }
/// ```
pub trait Hook: Send + Sync {
    fn apply(&self, ctx: &mut HookContext<'_>) -> std::result::Result<(), BoxError>;
}

impl<F> Hook for F
where
    F: Fn(&mut HookContext<'_>) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn apply(&self, ctx: &mut HookContext<'_>) -> std::result::Result<(), BoxError> {
        self(ctx)
    }
}

/// What a hook failure does to the rest of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookPolicy {
    /// Report the failure on stderr and keep running later hooks. One
    /// misbehaving hook cannot silence the rest of the pipeline.
    #[default]
    FailSoft,
    /// Report the failure and stop the chain. The record is still emitted
    /// as mutated so far; a log call never disappears because of a hook.
    Strict,
}

/// Run the chain over one record. Each hook sees every mutation made by the
/// hooks before it; the record leaves fully mutated and ready for emission.
pub(crate) fn run_hooks(
    record: &mut LogRecord,
    logger_level: Severity,
    hooks: &[Arc<dyn Hook>],
    policy: HookPolicy,
) {
    for hook in hooks {
        let mut ctx = HookContext::new(record, logger_level);
        if let Err(err) = hook.apply(&mut ctx) {
            eprintln!("hooklog: hook failed on logger {:?}: {}", record.logger, err);
            if policy == HookPolicy::Strict {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn record() -> LogRecord {
        LogRecord::build(
            "test",
            Severity::Info,
            "original",
            IndexMap::new(),
            IndexMap::new(),
        )
    }

    #[test]
    fn later_hooks_observe_earlier_mutations() {
        let chain: Vec<Arc<dyn Hook>> = vec![
            Arc::new(
                |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    ctx.set_field("x", 1)?;
                    Ok(())
                },
            ),
            Arc::new(
                |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    let x = ctx.fields()["x"].as_i64().unwrap();
                    ctx.set_field("y", x + 1)?;
                    Ok(())
                },
            ),
        ];

        let mut rec = record();
        run_hooks(&mut rec, Severity::Debug, &chain, HookPolicy::FailSoft);

        assert_eq!(rec.fields["x"], json!(1));
        assert_eq!(rec.fields["y"], json!(2));
    }

    #[test]
    fn fail_soft_keeps_the_chain_running() {
        let chain: Vec<Arc<dyn Hook>> = vec![
            Arc::new(
                |_: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    Err("boom".into())
                },
            ),
            Arc::new(
                |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    ctx.set_field("z", 1)?;
                    Ok(())
                },
            ),
        ];

        let mut rec = record();
        run_hooks(&mut rec, Severity::Debug, &chain, HookPolicy::FailSoft);

        assert_eq!(rec.fields["z"], json!(1));
    }

    #[test]
    fn strict_stops_after_a_failure_but_keeps_prior_mutations() {
        let chain: Vec<Arc<dyn Hook>> = vec![
            Arc::new(
                |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    ctx.set_field("before", true)?;
                    Ok(())
                },
            ),
            Arc::new(
                |_: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    Err("boom".into())
                },
            ),
            Arc::new(
                |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                    ctx.set_field("after", true)?;
                    Ok(())
                },
            ),
        ];

        let mut rec = record();
        run_hooks(&mut rec, Severity::Debug, &chain, HookPolicy::Strict);

        assert_eq!(rec.fields["before"], json!(true));
        assert!(!rec.fields.contains_key("after"));
    }

    #[test]
    fn hooks_can_rewrite_message_and_delete_fields() {
        let chain: Vec<Arc<dyn Hook>> = vec![Arc::new(
            |ctx: &mut HookContext<'_>| -> std::result::Result<(), BoxError> {
                ctx.set_message(format!("{} (redacted)", ctx.message()));
                ctx.remove_field("secret");
                Ok(())
            },
        )];

        let mut rec = record();
        rec.fields.insert("secret".into(), json!("hunter2"));
        run_hooks(&mut rec, Severity::Debug, &chain, HookPolicy::FailSoft);

        assert_eq!(rec.message, "original (redacted)");
        assert!(!rec.fields.contains_key("secret"));
    }
}
