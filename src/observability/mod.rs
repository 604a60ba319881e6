//! Observability for the connection manager
//!
//! Structured logging through `tracing`; see [`logging`] for the environment
//! variables that control it.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{dial_span, manager_span};
