//! Environment variable names used by this crate for convenient sink
//! configuration in services.
//!
//! These are purely helpers; env access happens once, inside configuration
//! resolution, never ad hoc at log time.

/// Elasticsearch cluster endpoint, e.g. `https://es.internal:9200`.
pub const ELASTICSEARCH_URL_ENV: &str = "ELASTICSEARCH_URL";

/// Target index name for forwarded log documents.
pub const ELASTICSEARCH_INDEX_ENV: &str = "ELASTICSEARCH_INDEX";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
