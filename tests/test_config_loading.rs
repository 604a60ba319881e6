//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use mqconn::config::{ConfigError, Environ, MqConfig, ENV_CONNECT_DELAY, ENV_HOST, ENV_PASSWORD, ENV_USER};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
host = "mqtt://broker.local:1884"
user = "svc-orders"
password = "s3cret"
connect_attempts = 5
connect_delay_secs = 2
"#,
    );

    let config = MqConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.host, "mqtt://broker.local:1884");
    assert_eq!(config.user, "svc-orders");
    assert_eq!(config.password, "s3cret");
    assert_eq!(config.connect_attempts, 5);
    assert_eq!(config.connect_delay(), Duration::from_secs(2));
}

#[test]
fn test_config_applies_retry_defaults() {
    let temp_file = write_config(
        r#"
host = "broker.local"
user = "svc"
password = "pw"
"#,
    );

    let config = MqConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.connect_attempts, 3);
    assert_eq!(config.connect_delay_secs, 5);
}

#[test]
fn test_config_fails_with_missing_file() {
    let result = MqConfig::load_from_file(Path::new("/nonexistent/path/mqconn.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_fails_with_invalid_toml() {
    let temp_file = write_config("host = \"unterminated");
    let result = MqConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_fails_with_missing_required_field() {
    let temp_file = write_config(
        r#"
host = "broker.local"
user = "svc"
"#,
    );
    let result = MqConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_zero_attempts() {
    let temp_file = write_config(
        r#"
host = "broker.local"
user = "svc"
password = "pw"
connect_attempts = 0
"#,
    );
    let result = MqConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_rejects_blank_host() {
    let temp_file = write_config(
        r#"
host = "   "
user = "svc"
password = "pw"
"#,
    );
    match MqConfig::load_from_file(temp_file.path()) {
        Err(ConfigError::BlankValue(key)) => assert_eq!(key, ENV_HOST),
        other => panic!("expected blank host, got {other:?}"),
    }
}

#[test]
fn test_environ_unparsable_delay_falls_back_to_default() {
    let environ: Environ = [
        (ENV_HOST, "broker.local"),
        (ENV_USER, "svc"),
        (ENV_PASSWORD, "pw"),
        (ENV_CONNECT_DELAY, "soon"),
    ]
    .into_iter()
    .collect();

    let config = MqConfig::from_environ(&environ).unwrap();
    assert_eq!(config.connect_delay(), Duration::from_secs(5));
}

#[test]
fn test_redacted_config_serializes_without_password() {
    let temp_file = write_config(
        r#"
host = "broker.local"
user = "svc"
password = "do-not-print"
"#,
    );
    let config = MqConfig::load_from_file(temp_file.path()).unwrap();

    let rendered = toml::to_string_pretty(&config.redacted()).unwrap();

    assert!(!rendered.contains("do-not-print"));
    assert!(rendered.contains("broker.local"));
}
