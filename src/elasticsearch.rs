use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::env::{ELASTICSEARCH_INDEX_ENV, ELASTICSEARCH_URL_ENV};
use crate::errors::{BoxError, Error, Result};
use crate::hook::{Hook, HookContext};
use crate::record::{Severity, RESERVED_KEYS};

/// Configuration for [`ElasticsearchHook`].
///
/// `url` and `index` resolve with explicit-argument-over-environment
/// precedence: a value set here wins, otherwise `ELASTICSEARCH_URL` /
/// `ELASTICSEARCH_INDEX` are consulted, and if neither is present hook
/// construction fails. Resolution happens once, at construction; nothing
/// reads the environment at log time.
#[derive(Clone, Debug, Default)]
pub struct ElasticsearchConfig {
    url: Option<String>,
    index: Option<String>,
    username: Option<String>,
    password: Option<String>,
    verify_certs: Option<bool>,
    min_severity: Option<Severity>,
    queue_capacity: Option<usize>,
}

impl ElasticsearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster endpoint, e.g. `https://es.internal:9200`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Target index for forwarded documents.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disable to accept self-signed cluster certificates. Defaults to on.
    pub fn verify_certs(mut self, verify: bool) -> Self {
        self.verify_certs = Some(verify);
        self
    }

    /// Forward only records at or above this severity. Unset forwards
    /// everything the logger emits.
    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    /// Capacity of the bounded queue between log calls and the background
    /// sender. A full queue drops documents rather than blocking the caller.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    fn resolve_url(&self) -> Result<String> {
        self.url
            .clone()
            .or_else(|| std::env::var(ELASTICSEARCH_URL_ENV).ok())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no Elasticsearch URL given and {} is unset",
                    ELASTICSEARCH_URL_ENV
                ))
            })
    }

    fn resolve_index(&self) -> Result<String> {
        self.index
            .clone()
            .or_else(|| std::env::var(ELASTICSEARCH_INDEX_ENV).ok())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "no Elasticsearch index given and {} is unset",
                    ELASTICSEARCH_INDEX_ENV
                ))
            })
    }
}

/// Opaque transport that indexes one document into the document store.
///
/// The HTTP implementation is the production path; tests substitute an
/// in-memory capture.
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    async fn index(&self, document: Value) -> std::result::Result<(), BoxError>;
}

/// Transport that POSTs documents to `{url}/{index}/_doc`.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    fn new(url: &str, index: &str, config: &ElasticsearchConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_certs.unwrap_or(true))
            .build()
            .map_err(|err| Error::configuration(format!("HTTP client setup failed: {}", err)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}/_doc", url.trim_end_matches('/'), index),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl DocumentTransport for HttpTransport {
    async fn index(&self, document: Value) -> std::result::Result<(), BoxError> {
        let mut request = self.client.post(&self.endpoint).json(&document);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let resp = request.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("Elasticsearch index failed with status {}: {}", status, text).into())
        }
    }
}

/// Hook that forwards each finished record to an Elasticsearch index.
///
/// The record's structural values are remapped into document-store shape:
/// `@timestamp`, `@message`, `level`, `name`, followed by the record's extra
/// fields. The remap happens on a private copy; the shared record is left
/// untouched for hooks registered after this one.
///
/// Network I/O never runs on the logging thread. `apply` enqueues the
/// document into a bounded channel drained by a background task, so this
/// hook must be constructed inside a tokio runtime. A full queue drops the
/// document and reports on stderr.
pub struct ElasticsearchHook {
    sender: mpsc::Sender<Value>,
    min_severity: Option<Severity>,
    /// Documents dropped because the queue was full.
    pub dropped: Arc<AtomicU64>,
}

impl ElasticsearchHook {
    /// Build the HTTP transport from `config` and spawn the forwarding task.
    ///
    /// Fails only on configuration problems: unresolvable url/index or a
    /// client that cannot be constructed.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let url = config.resolve_url()?;
        let index = config.resolve_index()?;
        let transport = HttpTransport::new(&url, &index, &config)?;
        Ok(Self::with_transport(Arc::new(transport), &config))
    }

    /// Like [`new`](ElasticsearchHook::new) but with a caller-supplied
    /// transport; url/index resolution is the transport's concern.
    pub fn with_transport(
        transport: Arc<dyn DocumentTransport>,
        config: &ElasticsearchConfig,
    ) -> Self {
        let capacity = config.queue_capacity.unwrap_or(1024).max(16);
        let (tx, mut rx) = mpsc::channel::<Value>(capacity);

        tokio::spawn(async move {
            while let Some(document) = rx.recv().await {
                if let Err(err) = transport.index(document).await {
                    eprintln!("hooklog: elasticsearch forward failed: {}", err);
                }
            }
        });

        Self {
            sender: tx,
            min_severity: config.min_severity,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn queue_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Hook for ElasticsearchHook {
    fn apply(&self, ctx: &mut HookContext<'_>) -> std::result::Result<(), BoxError> {
        if let Some(min) = self.min_severity {
            if ctx.severity() < min {
                return Ok(());
            }
        }

        let document = build_document(ctx);
        if self.sender.try_send(document).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            eprintln!(
                "hooklog: elasticsearch queue full, dropping document from logger {:?}",
                ctx.logger_name()
            );
        }
        Ok(())
    }
}

/// Remap a record into the forwarded document shape on a private copy.
///
/// Extra fields ride along unchanged, except reserved keys (which would
/// shadow the remapped structural values) and keys starting with `_`
/// (reserved for document-store metadata).
fn build_document(ctx: &HookContext<'_>) -> Value {
    let mut document = Map::new();
    document.insert(
        "@timestamp".into(),
        Value::String(ctx.timestamp().to_rfc3339()),
    );
    document.insert("@message".into(), Value::String(ctx.message().to_string()));
    document.insert(
        "level".into(),
        Value::String(ctx.severity().as_str().to_string()),
    );
    document.insert("name".into(), Value::String(ctx.logger_name().to_string()));

    for (key, value) in ctx.fields() {
        if RESERVED_KEYS.contains(&key.as_str()) || key.starts_with('_') {
            continue;
        }
        document.insert(key.clone(), value.clone());
    }

    Value::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CaptureTransport {
        documents: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl DocumentTransport for CaptureTransport {
        async fn index(&self, document: Value) -> std::result::Result<(), BoxError> {
            self.documents.lock().unwrap().push(document);
            Ok(())
        }
    }

    fn record_with(fields: IndexMap<String, Value>) -> LogRecord {
        LogRecord::build("api", Severity::Info, "m", fields, IndexMap::new())
    }

    #[test]
    fn resolution_precedence_argument_env_error() {
        // One test covers all three env states to avoid racing the process
        // environment across parallel tests.
        std::env::remove_var(ELASTICSEARCH_URL_ENV);
        std::env::remove_var(ELASTICSEARCH_INDEX_ENV);

        let bare = ElasticsearchConfig::new();
        assert!(matches!(
            bare.resolve_url().unwrap_err(),
            Error::Configuration { .. }
        ));
        assert!(matches!(
            bare.resolve_index().unwrap_err(),
            Error::Configuration { .. }
        ));

        std::env::set_var(ELASTICSEARCH_URL_ENV, "http://env:9200");
        std::env::set_var(ELASTICSEARCH_INDEX_ENV, "env-logs");
        assert_eq!(bare.resolve_url().unwrap(), "http://env:9200");
        assert_eq!(bare.resolve_index().unwrap(), "env-logs");

        let explicit = ElasticsearchConfig::new()
            .url("http://arg:9200")
            .index("arg-logs");
        assert_eq!(explicit.resolve_url().unwrap(), "http://arg:9200");
        assert_eq!(explicit.resolve_index().unwrap(), "arg-logs");

        std::env::remove_var(ELASTICSEARCH_URL_ENV);
        std::env::remove_var(ELASTICSEARCH_INDEX_ENV);
    }

    #[test]
    fn document_remaps_structural_keys_and_drops_originals() {
        let mut fields = IndexMap::new();
        fields.insert("asctime".to_string(), json!("user-shadow"));
        fields.insert("levelname".to_string(), json!("user-shadow"));
        fields.insert("request_id".to_string(), json!("req-1"));
        fields.insert("_meta".to_string(), json!("dropped"));

        let mut record = record_with(fields);
        let ctx = HookContext::new(&mut record, Severity::Debug);
        let document = build_document(&ctx);
        let object = document.as_object().unwrap();

        assert_eq!(object["@message"], json!("m"));
        assert_eq!(object["level"], json!("INFO"));
        assert_eq!(object["name"], json!("api"));
        assert!(object.contains_key("@timestamp"));
        assert_eq!(object["request_id"], json!("req-1"));

        assert!(!object.contains_key("asctime"));
        assert!(!object.contains_key("levelname"));
        assert!(!object.contains_key("message"));
        assert!(!object.contains_key("_meta"));
    }

    #[test]
    fn remap_does_not_mutate_the_shared_record() {
        let mut fields = IndexMap::new();
        fields.insert("request_id".to_string(), json!("req-1"));

        let mut record = record_with(fields);
        let ctx = HookContext::new(&mut record, Severity::Debug);
        let _ = build_document(&ctx);

        assert_eq!(record.message, "m");
        assert_eq!(record.fields["request_id"], json!("req-1"));
        assert!(!record.fields.contains_key("@message"));
    }

    #[tokio::test]
    async fn apply_forwards_through_the_background_task() {
        let transport = Arc::new(CaptureTransport::default());
        let hook = ElasticsearchHook::with_transport(
            transport.clone(),
            &ElasticsearchConfig::new().queue_capacity(64),
        );

        let mut record = record_with(IndexMap::new());
        let mut ctx = HookContext::new(&mut record, Severity::Debug);
        hook.apply(&mut ctx).unwrap();

        for _ in 0..50 {
            if !transport.documents.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let documents = transport.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["@message"], json!("m"));
        assert_eq!(hook.queue_dropped(), 0);
    }

    #[tokio::test]
    async fn min_severity_filters_forwarding_only() {
        let transport = Arc::new(CaptureTransport::default());
        let hook = ElasticsearchHook::with_transport(
            transport.clone(),
            &ElasticsearchConfig::new().min_severity(Severity::Error),
        );

        let mut record = record_with(IndexMap::new());
        let mut ctx = HookContext::new(&mut record, Severity::Debug);
        hook.apply(&mut ctx).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.documents.lock().unwrap().is_empty());
    }
}
