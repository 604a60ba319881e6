//! Transport driver seam
//!
//! The connection manager never talks to a broker library directly. It dials
//! and opens sessions through the [`Transport`] trait so the retry and
//! deduplication machinery can be exercised against scripted drivers, and the
//! production driver ([`mqtt::MqttTransport`]) can be swapped without touching
//! the coordination code.

use thiserror::Error;

pub mod mqtt;

/// Errors reported by a transport driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("Session open failed: {0}")]
    SessionFailed(String),
    #[error("Invalid broker host: {0}")]
    InvalidHost(String),
    #[error("Connection closed")]
    Closed,
}

/// Broker driver used by the connection manager
///
/// Both operations may take arbitrarily long; callers race them against their
/// cancellation token, so implementations do not need to watch for
/// cancellation themselves.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Established transport-level connection
    type Connection: Send + Sync + 'static;
    /// Logical channel opened on top of a connection
    type Session: Send + 'static;

    /// Establish a new connection to the broker
    async fn connect(
        &self,
        host: &str,
        user: &str,
        password: &str,
    ) -> Result<Self::Connection, TransportError>;

    /// Open a session on an established connection
    async fn open_session(
        &self,
        connection: &Self::Connection,
    ) -> Result<Self::Session, TransportError>;
}

/// Type alias for the production driver
pub type MqttTransport = mqtt::MqttTransport;
