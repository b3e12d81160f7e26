//! Observability infrastructure for kubesweep.
//!
//! Structured logging with consistent spans. This module provides the
//! subscriber initialization helper and span constructors shared by the
//! reconciler and any embedding CLI.

use std::fmt;
use std::str::FromStr;

use tracing::Span;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the [`LogFormat`].
pub const LOG_FORMAT_ENV: &str = "KUBESWEEP_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed multi-line logs (for development).
    #[default]
    Pretty,
    /// Single-line logs (for tests and CI output).
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        })
    }
}

/// Subscriber settings for [`init_logging_with`].
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Output format.
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Route output through the test harness capture.
    pub test_writer: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            default_filter: "info".into(),
            test_writer: false,
        }
    }
}

impl LogSettings {
    /// Reads the format from `KUBESWEEP_LOG_FORMAT`, falling back to the
    /// default for unset or unknown values.
    #[must_use]
    pub fn from_env() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        Self {
            format,
            ..Self::default()
        }
    }
}

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

fn fmt_layer(settings: &LogSettings) -> BoxedLayer {
    let writer = || {
        if settings.test_writer {
            BoxMakeWriter::new(tracing_subscriber::fmt::TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    };
    let layer = tracing_subscriber::fmt::layer();
    match settings.format {
        LogFormat::Json => layer.json().with_writer(writer()).boxed(),
        LogFormat::Pretty => layer.pretty().with_writer(writer()).boxed(),
        LogFormat::Compact => layer.compact().with_writer(writer()).boxed(),
    }
}

/// Initializes the logging subsystem with `format` and an `info` default
/// filter.
///
/// Returns false if a global subscriber was already installed, in which case
/// nothing changes.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `kubesweep_gc=debug`)
///
/// # Example
///
/// ```rust
/// use kubesweep_core::observability::{LogSettings, init_logging_with};
///
/// init_logging_with(&LogSettings::from_env());
/// ```
pub fn init_logging(format: LogFormat) -> bool {
    init_logging_with(&LogSettings {
        format,
        ..LogSettings::default()
    })
}

/// Initializes the logging subsystem from `settings`.
///
/// Safe to call repeatedly; only the first call in a process installs a
/// subscriber.
pub fn init_logging_with(settings: &LogSettings) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(settings))
        .try_init()
        .is_ok()
}

/// Creates the span that wraps one reconcile run.
///
/// # Example
///
/// ```rust
/// use kubesweep_core::observability::reconcile_span;
///
/// let span = reconcile_span("prod-eu", "build-4812", "01J0000000000000000000000");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn reconcile_span(scope: &str, run_tag: &str, run_id: &str) -> Span {
    tracing::info_span!("reconcile", scope = scope, run_tag = run_tag, run_id = run_id)
}

/// Creates a span for a single object operation.
#[must_use]
pub fn object_span(operation: &str, object: &str) -> Span {
    tracing::debug_span!("object", op = operation, object = object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" Compact ".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }

    #[test]
    fn test_init_logging_installs_once() {
        let settings = LogSettings {
            format: LogFormat::Compact,
            test_writer: true,
            ..LogSettings::default()
        };
        // Another test in this binary may have installed first.
        let _ = init_logging_with(&settings);
        assert!(!init_logging(LogFormat::Json));
    }

    #[test]
    fn test_reconcile_span_creates_span() {
        let span = reconcile_span("prod", "tag-1", "run-1");
        let _guard = span.enter();
        tracing::info!("message in span");
    }

    #[test]
    fn test_object_span_creates_span() {
        let span = object_span("delete", "ConfigMap default/a");
        let _guard = span.enter();
        tracing::debug!("object message");
    }
}
