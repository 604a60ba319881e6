//! Pure connection configuration for the MQTT driver
//!
//! Broker address parsing and client option construction. Nothing here
//! touches the network.

use crate::transport::TransportError;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 1883;
const DEFAULT_TLS_PORT: u16 = 8883;

/// Keep-alive interval negotiated with the broker
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Broker endpoint resolved from the configured host string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    /// Parse `host`, `host:port`, `mqtt://host[:port]` or `mqtts://host[:port]`
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TransportError::InvalidHost(raw.to_string()));
        }

        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("mqtt://{raw}")
        };
        let url =
            Url::parse(&candidate).map_err(|_| TransportError::InvalidHost(raw.to_string()))?;

        let tls = match url.scheme() {
            "mqtt" | "tcp" => false,
            "mqtts" | "ssl" => true,
            _ => return Err(TransportError::InvalidHost(raw.to_string())),
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| TransportError::InvalidHost(raw.to_string()))?;
        let port = url
            .port()
            .unwrap_or(if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT });

        Ok(Self {
            host: host.to_string(),
            port,
            tls,
        })
    }
}

/// Build client options for one connection attempt
///
/// Every attempt gets a fresh client id so a half-open session from a previous
/// attempt cannot collide with the new one on the broker.
pub fn configure_mqtt_options(address: &BrokerAddress, user: &str, password: &str) -> MqttOptions {
    let client_id = format!("mqconn-{}", uuid::Uuid::new_v4());
    let mut mqtt_options = MqttOptions::new(client_id, address.host.clone(), address.port);

    if address.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if !user.is_empty() {
        mqtt_options.set_credentials(user, password);
    }

    mqtt_options.set_keep_alive(KEEP_ALIVE);
    mqtt_options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_host_uses_default_port() {
        let address = BrokerAddress::parse("localhost").unwrap();
        assert_eq!(address.host, "localhost");
        assert_eq!(address.port, 1883);
        assert!(!address.tls);
    }

    #[test]
    fn test_parse_host_and_port() {
        let address = BrokerAddress::parse("broker.internal:5672").unwrap();
        assert_eq!(address.host, "broker.internal");
        assert_eq!(address.port, 5672);
    }

    #[test]
    fn test_parse_tls_scheme() {
        let address = BrokerAddress::parse("mqtts://secure.example.com").unwrap();
        assert_eq!(address.host, "secure.example.com");
        assert_eq!(address.port, 8883);
        assert!(address.tls);
    }

    #[test]
    fn test_parse_explicit_scheme_and_port() {
        let address = BrokerAddress::parse("mqtt://10.0.0.7:11883").unwrap();
        assert_eq!(address.host, "10.0.0.7");
        assert_eq!(address.port, 11883);
        assert!(!address.tls);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let address = BrokerAddress::parse("  localhost:1883 \n").unwrap();
        assert_eq!(address.host, "localhost");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(matches!(
            BrokerAddress::parse("   "),
            Err(TransportError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(matches!(
            BrokerAddress::parse("http://localhost"),
            Err(TransportError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_configure_options_targets_address() {
        let address = BrokerAddress::parse("broker:1884").unwrap();
        let options = configure_mqtt_options(&address, "user", "secret");

        assert_eq!(options.broker_address(), ("broker".to_string(), 1884));
        assert!(options.client_id().starts_with("mqconn-"));
    }

    #[test]
    fn test_configure_options_fresh_client_id_per_attempt() {
        let address = BrokerAddress::parse("broker").unwrap();
        let first = configure_mqtt_options(&address, "user", "secret");
        let second = configure_mqtt_options(&address, "user", "secret");

        assert_ne!(first.client_id(), second.client_id());
    }
}
