//! # Logging
//!
//! Installs the global tracing subscriber. `RUST_LOG` overrides the default filter;
//! `LOG_FORMAT=text` switches from JSON lines to human-readable output.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "nodepool_ingress_controller=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Anything but `text` (case-insensitive) selects JSON
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the subscriber; a second call is a no-op
pub fn init(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let result = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        tracing::warn!("tracing subscriber already initialized: {e}");
    }
}
