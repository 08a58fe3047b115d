//! Tracing subscriber setup shared by the server binary and ad-hoc tools.
//!
//! `log::*` calls (store layer, dependencies) are bridged through
//! `tracing_log::LogTracer` so they carry the active job span.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the output format (`json` or anything else for text).
pub const LOG_FORMAT_ENV_VAR: &str = "OFFER_INGEST_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,reqwest=warn,redis=warn,h2=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" | "jsonl" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV_VAR)
            .map(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }
}

/// Builds the filter from `RUST_LOG`, falling back to `info` with noisy
/// HTTP and redis internals turned down.
pub fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global subscriber. Calling it twice is harmless; the second
/// call is ignored with a warning on stderr.
pub fn init_logging(format: LogFormat) {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {}", e);
    }

    let registry = tracing_subscriber::registry().with(build_env_filter());
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
