//! Error types for connection management
//!
//! Gate contention and dial exhaustion have their own types next to the code
//! that raises them; [`ConnError`] is what the manager façade hands back to
//! callers.

use crate::config::ConfigError;
use crate::connection::state::StateError;
use crate::sync::GateError;
use crate::transport::TransportError;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Main error type for connection manager operations
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("Connection management already running: {0}")]
    AlreadyRunning(GateError),

    #[error("Connection manager has been shut down")]
    Stopped,

    #[error("Operation canceled")]
    Cancelled,

    #[error("Connection state bad even after reconnection: {0}")]
    Unhealthy(StateError),

    #[error("Session error: {0}")]
    Session(TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for connection manager operations
pub type ConnResult<T> = Result<T, ConnError>;

fn secret_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)(password|passwd|token|secret)[=:]\s*\S+").ok())
        .as_ref()
}

fn url_credentials_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(://[^:/@\s]+):[^@\s]+@").ok())
        .as_ref()
}

/// Strip credentials from driver error text before it is logged
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(pattern) = secret_pattern() {
        sanitized = pattern.replace_all(&sanitized, "${1}=***").to_string();
    }

    // user:password@host inside broker URLs
    if let Some(pattern) = url_credentials_pattern() {
        sanitized = pattern.replace_all(&sanitized, "${1}:***@").to_string();
    }

    sanitized
}
