//! Broker connection configuration
//!
//! Loaded from the process environment (`MQ_*` variables) or a TOML file and
//! validated before it reaches the connection manager: credentials are
//! non-blank and at least one connect attempt is configured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const ENV_HOST: &str = "MQ_HOST";
pub const ENV_USER: &str = "MQ_USER";
pub const ENV_PASSWORD: &str = "MQ_PASSWORD";
pub const ENV_CONNECT_ATTEMPTS: &str = "MQ_CONN_ATTEMPTS";
pub const ENV_CONNECT_DELAY: &str = "MQ_CONN_DELAY";

const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_CONNECT_DELAY_SECS: u64 = 5;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Value may not be blank: {0}")]
    BlankValue(String),
    #[error("Bad value for {key}: {value}")]
    BadValue { key: String, value: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Snapshot of environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ(HashMap<String, String>);

impl Environ {
    /// Capture the current process environment
    pub fn from_process() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::EnvVarNotFound(key.to_string()))
    }

    pub fn get_int(&self, key: &str) -> Result<u64, ConfigError> {
        let raw = self.get_string(key)?;
        raw.trim().parse::<u64>().map_err(|_| ConfigError::BadValue {
            key: key.to_string(),
            value: raw,
        })
    }

    /// Set and non-empty
    pub fn get_bool(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|value| !value.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for Environ
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Immutable broker connection settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MqConfig {
    /// Broker host, optionally with scheme and port
    pub host: String,
    pub user: String,
    pub password: String,
    /// Dial attempts per reconnect (>= 1)
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between dial attempts, in seconds
    #[serde(default = "default_connect_delay_secs")]
    pub connect_delay_secs: u64,
}

fn default_connect_attempts() -> u32 {
    DEFAULT_CONNECT_ATTEMPTS
}

fn default_connect_delay_secs() -> u64 {
    DEFAULT_CONNECT_DELAY_SECS
}

impl fmt::Debug for MqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"***")
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_delay_secs", &self.connect_delay_secs)
            .finish()
    }
}

impl MqConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_secs(self.connect_delay_secs)
    }

    /// Load from the current process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environ(&Environ::from_process())
    }

    /// Load from an environment snapshot.
    ///
    /// Host and credentials are required; attempt count and delay fall back to
    /// their defaults when unset or unparsable.
    pub fn from_environ(environ: &Environ) -> Result<Self, ConfigError> {
        debug!("loading MQ config");

        let host = required_env(environ, ENV_HOST)?;
        let user = required_env(environ, ENV_USER)?;
        let password = required_env(environ, ENV_PASSWORD)?;

        let connect_attempts = match environ.get_int(ENV_CONNECT_ATTEMPTS) {
            Ok(value) => u32::try_from(value).map_err(|_| ConfigError::BadValue {
                key: ENV_CONNECT_ATTEMPTS.to_string(),
                value: value.to_string(),
            })?,
            Err(e) => {
                warn!(
                    "{} unusable ({}), using default: {}",
                    ENV_CONNECT_ATTEMPTS, e, DEFAULT_CONNECT_ATTEMPTS
                );
                DEFAULT_CONNECT_ATTEMPTS
            }
        };

        let connect_delay_secs = match environ.get_int(ENV_CONNECT_DELAY) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "{} unusable ({}), using default: {}",
                    ENV_CONNECT_DELAY, e, DEFAULT_CONNECT_DELAY_SECS
                );
                DEFAULT_CONNECT_DELAY_SECS
            }
        };

        let config = Self {
            host,
            user,
            password,
            connect_attempts,
            connect_delay_secs,
        };
        config.validate()?;

        debug!(
            connect_attempts = config.connect_attempts,
            connect_delay_secs = config.connect_delay_secs,
            "MQ config loaded"
        );
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: MqConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            (ENV_HOST, &self.host),
            (ENV_USER, &self.user),
            (ENV_PASSWORD, &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::BlankValue(key.to_string()));
            }
        }

        if self.connect_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy safe to print or serialize
    pub fn redacted(&self) -> Self {
        Self {
            password: "***".to_string(),
            ..self.clone()
        }
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config(connect_attempts: u32, connect_delay_secs: u64) -> Self {
        Self {
            host: "localhost:1883".to_string(),
            user: "guest".to_string(),
            password: "guest-secret".to_string(),
            connect_attempts,
            connect_delay_secs,
        }
    }
}

fn required_env(environ: &Environ, key: &str) -> Result<String, ConfigError> {
    let value = environ.get_string(key)?;
    if value.trim().is_empty() {
        return Err(ConfigError::BlankValue(key.to_string()));
    }
    debug!("successfully read var: {}", key);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_environ() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_HOST, "broker:1883"),
            (ENV_USER, "app"),
            (ENV_PASSWORD, "hunter2"),
        ]
    }

    #[test]
    fn test_defaults_applied_when_optional_vars_unset() {
        let environ: Environ = base_environ().into_iter().collect();
        let config = MqConfig::from_environ(&environ).unwrap();

        assert_eq!(config.host, "broker:1883");
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.connect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_optional_vars_override_defaults() {
        let mut vars = base_environ();
        vars.push((ENV_CONNECT_ATTEMPTS, "7"));
        vars.push((ENV_CONNECT_DELAY, "0"));
        let environ: Environ = vars.into_iter().collect();

        let config = MqConfig::from_environ(&environ).unwrap();
        assert_eq!(config.connect_attempts, 7);
        assert_eq!(config.connect_delay(), Duration::ZERO);
    }

    #[test]
    fn test_unparsable_attempts_falls_back_to_default() {
        let mut vars = base_environ();
        vars.push((ENV_CONNECT_ATTEMPTS, "lots"));
        let environ: Environ = vars.into_iter().collect();

        let config = MqConfig::from_environ(&environ).unwrap();
        assert_eq!(config.connect_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut vars = base_environ();
        vars.push((ENV_CONNECT_ATTEMPTS, "0"));
        let environ: Environ = vars.into_iter().collect();

        assert!(matches!(
            MqConfig::from_environ(&environ),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_host_rejected() {
        let environ: Environ = [(ENV_USER, "app"), (ENV_PASSWORD, "pw")].into_iter().collect();

        match MqConfig::from_environ(&environ) {
            Err(ConfigError::EnvVarNotFound(key)) => assert_eq!(key, ENV_HOST),
            other => panic!("expected missing host, got {other:?}"),
        }
    }

    #[test]
    fn test_blank_password_rejected() {
        let environ: Environ = [(ENV_HOST, "broker"), (ENV_USER, "app"), (ENV_PASSWORD, "  ")]
            .into_iter()
            .collect();

        match MqConfig::from_environ(&environ) {
            Err(ConfigError::BlankValue(key)) => assert_eq!(key, ENV_PASSWORD),
            other => panic!("expected blank password, got {other:?}"),
        }
    }

    #[test]
    fn test_environ_get_bool() {
        let environ: Environ = [("DEBUG", "1"), ("QUIET", "")].into_iter().collect();
        assert!(environ.get_bool("DEBUG"));
        assert!(!environ.get_bool("QUIET"));
        assert!(!environ.get_bool("UNSET"));
    }

    #[test]
    fn test_debug_output_hides_password() {
        let config = MqConfig::test_config(3, 5);
        let rendered = format!("{config:?}");

        assert!(!rendered.contains("guest-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_redacted_copy() {
        let config = MqConfig::test_config(3, 5);
        let redacted = config.redacted();

        assert_eq!(redacted.password, "***");
        assert_eq!(redacted.host, config.host);
        assert_eq!(config.password, "guest-secret");
    }

    #[test]
    fn test_toml_defaults() {
        let toml_content = r#"
host = "mqtts://broker.example.com"
user = "app"
password = "pw"
"#;
        let config: MqConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.connect_attempts, 3);
        assert_eq!(config.connect_delay_secs, 5);
        assert!(config.validate().is_ok());
    }
}
