//! MQTT transport driver
//!
//! The driver is split the same way as the rest of the transport code:
//!
//! - [`connection`] - Pure address parsing and client option construction
//! - [`client`] - Impure I/O: connect, ConnAck wait, event loop supervision
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqconn::transport::{MqttTransport, Transport};
//!
//! # tokio_test::block_on(async {
//! let transport = MqttTransport::new();
//! let connection = transport.connect("mqtt://localhost:1883", "user", "secret").await?;
//! let session = transport.open_session(&connection).await?;
//! println!("session {} on connection {}", session.id(), connection.id());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;

pub use client::{MqttConnection, MqttSession, MqttTransport};
pub use connection::{configure_mqtt_options, BrokerAddress};
