//! mqconn - self-healing broker connection manager
//!
//! Keeps one logical connection to a message broker on behalf of an
//! application. Concurrent callers ask the manager for the connection (or a
//! session on it); when the published connection state is bad the manager
//! redials with a bounded number of attempts, and concurrent reconnect requests
//! collapse into a single dial.
//!
//! # Overview
//!
//! - [`sync::Gate`] - non-blocking try-lock used to serialise dials
//! - [`connection::Dialer`] - retrying, cancellable dial procedure
//! - [`connection::ConnectionManager`] - the façade and its two workers
//! - [`transport::Transport`] - driver seam, with an MQTT v5 implementation
//!
//! # Quick Start
//!
//! ```rust
//! use mqconn::testing::MockTransport;
//! use mqconn::{ConnectionManager, MqConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let config = MqConfig {
//!     host: "localhost:1883".to_string(),
//!     user: "app".to_string(),
//!     password: "secret".to_string(),
//!     connect_attempts: 3,
//!     connect_delay_secs: 0,
//! };
//!
//! let cancel = CancellationToken::new();
//! let manager = ConnectionManager::new(config, MockTransport::failing_first(2));
//! manager.manage_connection_async(&cancel)?;
//!
//! let session = manager.get_session(&cancel).await?;
//! assert_eq!(session.connection_id, 3);
//!
//! cancel.cancel();
//! manager.wait_stopped().await;
//! # Ok::<(), mqconn::ConnError>(())
//! # });
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod observability;
pub mod sync;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, Environ, MqConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState, DialError, Dialer};
pub use error::{ConnError, ConnResult};
pub use sync::{Gate, GateError, GateGuard};
pub use transport::{MqttTransport, Transport, TransportError};
