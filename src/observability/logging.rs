//! Structured logging system using tracing crate
//!
//! ## Log Format Options
//!
//! The output format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON format for production and log aggregation systems
//! - `pretty` - Human-readable format with colors and indentation for development
//! - `compact` - Terminal-friendly format with colors but minimal spacing
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: Log level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to WARN
//! - `DEBUG`: any non-empty value forces DEBUG regardless of `LOG_LEVEL`
//! - `LOG_FORMAT`: Output format (json, pretty, compact) - defaults to json
//! - `LOG_SPANS`: Include span events (true/false) - defaults to false
//! - `RUST_LOG`: Override log filtering (follows env_logger format)
//!
//! ## Examples
//!
//! ```bash
//! # Production JSON logging
//! LOG_FORMAT=json LOG_LEVEL=INFO mqconn run
//!
//! # Development with colors and every dial attempt
//! LOG_FORMAT=pretty DEBUG=1 mqconn run
//! ```

use crate::config::Environ;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: Level = Level::WARN;

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json, // Default to JSON for production
        }
    }
}

/// Parse a level name; `None` for anything unrecognised
pub fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

/// Effective level: `DEBUG` wins, then `LOG_LEVEL`, then the default
pub fn level_from_environ(environ: &Environ) -> Level {
    if environ.get_bool("DEBUG") {
        return Level::DEBUG;
    }

    match environ.get_string("LOG_LEVEL") {
        Ok(raw) if !raw.trim().is_empty() => parse_level(&raw).unwrap_or_else(|| {
            eprintln!("error parsing LOG_LEVEL: {raw}; using default: {DEFAULT_LEVEL}");
            DEFAULT_LEVEL
        }),
        _ => DEFAULT_LEVEL,
    }
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Initialize logging with manual configuration
pub fn init_logging(level: Level, format: LogFormat, include_spans: bool) {
    let mut filter = EnvFilter::new(level.to_string());
    // Reduce noise from dependencies
    for directive in ["rumqttc=warn", "tokio=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Allow RUST_LOG to override
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    // A subscriber may already be installed (tests, embedding applications)
    let _ = match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_span_events(span_events(include_spans)))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(span_events(include_spans)),
            )
            .try_init(),
    };
}

/// Initialize logging from environment variables
pub fn init_default_logging() {
    let environ = Environ::from_process();
    let level = level_from_environ(&environ);

    let format = environ
        .get_string("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string());
    let log_format = LogFormat::parse(&format);

    let include_spans = environ
        .get_string("LOG_SPANS")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    init_logging(level, log_format, include_spans);
}

/// Create a dial span with contextual information
#[macro_export]
macro_rules! dial_span {
    ($($field:tt)*) => {
        tracing::info_span!("mq_dial", $($field)*)
    };
}

/// Create a connection manager worker span
#[macro_export]
macro_rules! manager_span {
    ($($field:tt)*) => {
        tracing::info_span!("mq_manager", $($field)*)
    };
}

// Re-export macros for convenience
pub use {dial_span, manager_span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse_json() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
    }

    #[test]
    fn test_log_format_parse_pretty_and_compact() {
        assert_eq!(LogFormat::parse("Pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(" compact\n"), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_parse_invalid_defaults_to_json() {
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Json);
    }

    #[test]
    fn test_parse_level() {
        let test_cases = vec![
            ("ERROR", Some(Level::ERROR)),
            ("warn", Some(Level::WARN)),
            ("Warning", Some(Level::WARN)),
            ("info", Some(Level::INFO)),
            ("DEBUG", Some(Level::DEBUG)),
            ("trace", Some(Level::TRACE)),
            ("loud", None),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse_level(input), expected, "Failed for input: {input}");
        }
    }

    #[test]
    fn test_debug_flag_overrides_log_level() {
        let environ: Environ = [("DEBUG", "1"), ("LOG_LEVEL", "ERROR")].into_iter().collect();
        assert_eq!(level_from_environ(&environ), Level::DEBUG);
    }

    #[test]
    fn test_log_level_from_environ() {
        let environ: Environ = [("LOG_LEVEL", "info")].into_iter().collect();
        assert_eq!(level_from_environ(&environ), Level::INFO);
    }

    #[test]
    fn test_default_level_when_unset_or_invalid() {
        assert_eq!(level_from_environ(&Environ::default()), Level::WARN);

        let environ: Environ = [("LOG_LEVEL", "chatty")].into_iter().collect();
        assert_eq!(level_from_environ(&environ), Level::WARN);
    }
}
