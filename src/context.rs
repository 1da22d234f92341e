use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

use crate::errors::{Error, Result};

/// Persistent fields attached to one logger.
///
/// Context fields are merged into every record the owning logger builds and
/// are never cleared by a log call, unlike call-scoped fields. The map is
/// guarded so concurrent `field`/`fields` calls and concurrent log calls
/// through a shared logger never observe a half-written field set.
#[derive(Debug, Default)]
pub struct ContextStore {
    data: Mutex<IndexMap<String, Value>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single persistent field.
    ///
    /// The value is converted to JSON eagerly; an unsupported value type
    /// fails here, not deep in the emission pipeline.
    pub fn field(&self, key: impl Into<String>, value: impl Serialize) -> Result<&Self> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| Error::FieldType {
            key: key.clone(),
            source,
        })?;

        self.data.lock().unwrap().insert(key, value);
        Ok(self)
    }

    /// Add multiple persistent fields, equivalent to repeated [`field`]
    /// calls in iteration order.
    ///
    /// [`field`]: ContextStore::field
    pub fn fields<K, V, I>(&self, fields: I) -> Result<&Self>
    where
        K: Into<String>,
        V: Serialize,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut converted = Vec::new();
        for (key, value) in fields {
            let key = key.into();
            let value = serde_json::to_value(value).map_err(|source| Error::FieldType {
                key: key.clone(),
                source,
            })?;
            converted.push((key, value));
        }

        let mut data = self.data.lock().unwrap();
        for (key, value) in converted {
            data.insert(key, value);
        }
        Ok(self)
    }

    /// Remove one field; returns its previous value if it was set.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.lock().unwrap().shift_remove(key)
    }

    /// Delete all persistent fields.
    pub fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    /// Clone the current field set. Records are built from a snapshot so a
    /// context mutation racing a log call yields either the old or the new
    /// map, never a torn one.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.data.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }
}
