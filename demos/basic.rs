//! Minimal end-to-end usage: context fields, a redaction hook, and the
//! Elasticsearch forwarding hook configured from the environment.
//!
//! Run with a cluster available:
//!   ELASTICSEARCH_URL=http://localhost:9200 ELASTICSEARCH_INDEX=app-logs \
//!     cargo run --example basic

use hooklog::{
    BoxError, ElasticsearchConfig, ElasticsearchHook, HookContext, Logger, Severity,
};

#[tokio::main]
async fn main() {
    let logger = Logger::new("demo", Severity::Info);
    logger.context().field("service", "demo").unwrap();
    logger.context().field("version", env!("CARGO_PKG_VERSION")).unwrap();

    // Strip secrets before any emission or forwarding.
    logger.add_hook(|ctx: &mut HookContext<'_>| -> Result<(), BoxError> {
        ctx.remove_field("auth_token");
        Ok(())
    });

    match ElasticsearchHook::new(ElasticsearchConfig::new().min_severity(Severity::Warning)) {
        Ok(hook) => logger.add_hook(hook),
        Err(err) => eprintln!("forwarding disabled: {}", err),
    }

    logger
        .with_field("request_id", "req-1")
        .unwrap()
        .with_field("auth_token", "hunter2")
        .unwrap()
        .info("request accepted");

    logger
        .with_field("request_id", "req-2")
        .unwrap()
        .warning("slow upstream");

    // Give the background forwarder a moment before the runtime shuts down.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
}
