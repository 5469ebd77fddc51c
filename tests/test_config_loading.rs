//! Configuration loading and validation tests
//!
//! Tests focus on the behavior of loading from disk: defaults, secret
//! resolution through environment variables, and error reporting.

use gasmon::config::{ConfigError, MonitorConfig, DEFAULT_ALERT_TOPIC, DEFAULT_READING_TOPIC};
use std::io::Write;
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
[mqtt]
broker_url = "mqtts://broker.example.com:8883"
username_env = "GASMON_IT_MQTT_USER"
password_env = "GASMON_IT_MQTT_PASS"
client_id = "railcar-7"

[notifier]
endpoint = "https://api.callmebot.com/whatsapp.php"
recipient = "5511999999999"
api_key_env = "GASMON_IT_API_KEY"
startup_message = "Monitor online"

[engine]
history_capacity = 50

[status]
port = 9090
"#,
    );

    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.broker_url, "mqtts://broker.example.com:8883");
    assert_eq!(config.mqtt.client_id, "railcar-7");
    assert_eq!(config.mqtt.reading_topic, DEFAULT_READING_TOPIC);
    assert_eq!(config.mqtt.alert_topic, DEFAULT_ALERT_TOPIC);
    assert_eq!(config.notifier.startup_message.as_deref(), Some("Monitor online"));
    assert_eq!(config.engine.history_capacity, 50);
    assert_eq!(config.engine.queue_capacity, 64);
    assert!(config.engine.notify_on_initial_danger);
    assert_eq!(config.status.map(|status| status.port), Some(9090));
}

#[test]
fn test_minimal_config_has_no_status_server() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[notifier]
endpoint = "http://localhost:8081/send"
recipient = "1"
api_key_env = "GASMON_IT_API_KEY"
"#,
    );

    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();

    assert!(config.status.is_none());
    assert!(config.notifier.startup_message.is_none());
    assert_eq!(config.engine.history_capacity, 200);
    assert_eq!(config.engine.sample_interval_secs, 20);
}

#[test]
fn test_missing_file_reports_read_error() {
    let result = MonitorConfig::load_from_file(std::path::Path::new("/nonexistent/gasmon.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_reports_parse_error() {
    let temp_file = write_config("[mqtt\nbroker_url = ");
    let result = MonitorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_notifier_section_is_rejected() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
"#,
    );
    let result = MonitorConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_invalid_values_fail_validation_on_load() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "http://localhost:1883"

[notifier]
endpoint = "http://localhost:8081/send"
recipient = "1"
api_key_env = "GASMON_IT_API_KEY"
"#,
    );

    let err = MonitorConfig::load_from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
    assert!(err.to_string().contains("mqtt"));
}

#[test]
fn test_secrets_resolved_from_environment() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"
username_env = "GASMON_IT_RESOLVE_USER"
password_env = "GASMON_IT_RESOLVE_PASS"

[notifier]
endpoint = "http://localhost:8081/send"
recipient = "1"
api_key_env = "GASMON_IT_RESOLVE_KEY"
"#,
    );
    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();

    std::env::set_var("GASMON_IT_RESOLVE_USER", "sensor");
    std::env::set_var("GASMON_IT_RESOLVE_KEY", "abc123");
    std::env::remove_var("GASMON_IT_RESOLVE_PASS");

    assert_eq!(config.mqtt.username().as_deref(), Some("sensor"));
    assert_eq!(config.mqtt.password(), None);
    assert_eq!(config.get_notifier_api_key().unwrap(), "abc123");

    std::env::remove_var("GASMON_IT_RESOLVE_KEY");
    assert!(matches!(
        config.get_notifier_api_key(),
        Err(ConfigError::EnvVarNotFound(name)) if name == "GASMON_IT_RESOLVE_KEY"
    ));
}

#[test]
fn test_shown_config_parses_back() {
    let temp_file = write_config(
        r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[notifier]
endpoint = "http://localhost:8081/send"
recipient = "1"
api_key_env = "GASMON_IT_API_KEY"

[status]
port = 8080
"#,
    );
    let config = MonitorConfig::load_from_file(temp_file.path()).unwrap();

    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = MonitorConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
fn test_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gasmon.toml");
    let config = MonitorConfig::load_from_file(&path).unwrap();

    assert!(config.mqtt.broker_url.starts_with("mqtts://"));
    assert!(config.notifier.startup_message.is_some());
    assert!(config.status.is_some());
}
