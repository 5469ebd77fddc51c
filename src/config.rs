//! Configuration system for the gas monitor
//!
//! Configuration is a TOML file; secrets (broker credentials, notifier API key)
//! are never stored in it directly. The file names the environment variables
//! that hold them and they are resolved at runtime.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_READING_TOPIC: &str = "railtracker/gas/lpg_ppm";
pub const DEFAULT_ALERT_TOPIC: &str = "railtracker/gas/alert";

/// Main monitor configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub mqtt: MqttSection,
    pub notifier: NotifierSection,
    #[serde(default)]
    pub engine: EngineSection,
    /// HTTP status server (optional)
    pub status: Option<StatusSection>,
}

/// MQTT broker connection and topic layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// MQTT broker URL with protocol and port
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Client identifier prefix
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// MQTT keep alive in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    /// Topic carrying raw ppm readings
    #[serde(default = "default_reading_topic")]
    pub reading_topic: String,
    /// Topic carrying discrete threshold alerts
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
}

impl MqttSection {
    /// Broker username from the environment, if configured and set
    pub fn username(&self) -> Option<String> {
        get_env_var_optional(self.username_env.as_deref())
    }

    /// Broker password from the environment, if configured and set
    pub fn password(&self) -> Option<String> {
        get_env_var_optional(self.password_env.as_deref())
    }
}

/// Helper method to get environment variable with consistent error handling
fn get_env_var_optional(env_var_name: Option<&str>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

/// Helper method to get environment variable with error propagation
fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
    std::env::var(env_var_name).map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
}

fn default_client_id() -> String {
    "gasmon".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reading_topic() -> String {
    DEFAULT_READING_TOPIC.to_string()
}

fn default_alert_topic() -> String {
    DEFAULT_ALERT_TOPIC.to_string()
}

/// Outbound text notification endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotifierSection {
    /// Base URL of the messaging gateway (query string is appended)
    pub endpoint: String,
    /// Recipient phone number passed as the `phone` parameter
    pub recipient: String,
    /// Environment variable containing the gateway API key
    pub api_key_env: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
    /// Message sent once when the monitor starts, to prove delivery works
    pub startup_message: Option<String>,
}

fn default_notifier_timeout() -> u64 {
    5
}

impl NotifierSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Engine tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSection {
    /// Retention for readings, alerts and the notification log
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Sampling period of the sensor, used for the elapsed-time axis
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,
    /// Notify when the very first classified reading is already DANGER
    #[serde(default = "default_notify_on_initial_danger")]
    pub notify_on_initial_danger: bool,
    /// Pending notifications buffered for the dispatcher
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_history_capacity() -> usize {
    200
}

fn default_sample_interval() -> u64 {
    20
}

fn default_notify_on_initial_danger() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            sample_interval_secs: default_sample_interval(),
            notify_on_initial_danger: default_notify_on_initial_danger(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// HTTP status server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSection {
    #[serde(default = "default_status_port")]
    pub port: u16,
}

fn default_status_port() -> u16 {
    8080
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_broker_url(&self.mqtt.broker_url)?;

        if self.mqtt.reading_topic.trim().is_empty() || self.mqtt.alert_topic.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "reading_topic and alert_topic must not be empty".to_string(),
            ));
        }
        if self.mqtt.reading_topic == self.mqtt.alert_topic {
            return Err(ConfigError::InvalidConfig(format!(
                "reading_topic and alert_topic must differ (both are '{}')",
                self.mqtt.reading_topic
            )));
        }

        let endpoint = Url::parse(&self.notifier.endpoint).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "notifier endpoint '{}' is not a valid URL: {e}",
                self.notifier.endpoint
            ))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidConfig(format!(
                "notifier endpoint must be http(s), got '{}'",
                endpoint.scheme()
            )));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "notifier timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.engine.history_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "engine history_capacity must be greater than 0".to_string(),
            ));
        }
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "engine queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get notifier API key from environment variable
    pub fn get_notifier_api_key(&self) -> Result<String, ConfigError> {
        get_env_var_required(&self.notifier.api_key_env)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[mqtt]
broker_url = "mqtt://localhost:1883"

[notifier]
endpoint = "http://localhost:9999/whatsapp.php"
recipient = "5500000000000"
api_key_env = "GASMON_TEST_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Broker URLs must be `mqtt://` or `mqtts://` with a host
fn validate_broker_url(broker_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(broker_url).map_err(|_| {
        ConfigError::InvalidConfig(format!("Invalid broker URL: '{broker_url}'"))
    })?;

    if !matches!(url.scheme(), "mqtt" | "mqtts") {
        return Err(ConfigError::InvalidConfig(format!(
            "Broker URL scheme must be mqtt or mqtts, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidConfig(format!(
            "Broker URL '{broker_url}' has no host"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtts://broker.example.com:8883"
username_env = "MQTT_USER"
password_env = "MQTT_PASS"
client_id = "gas-dashboard"
reading_topic = "site/gas/ppm"
alert_topic = "site/gas/alert"

[notifier]
endpoint = "https://api.callmebot.com/whatsapp.php"
recipient = "5511999999999"
api_key_env = "CALLMEBOT_API_KEY"
timeout_secs = 3
startup_message = "monitor online"

[engine]
history_capacity = 50
sample_interval_secs = 10
notify_on_initial_danger = false

[status]
port = 9090
"#;

        let config = MonitorConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.mqtt.broker_url, "mqtts://broker.example.com:8883");
        assert_eq!(config.mqtt.client_id, "gas-dashboard");
        assert_eq!(config.mqtt.reading_topic, "site/gas/ppm");
        assert_eq!(config.notifier.timeout(), Duration::from_secs(3));
        assert_eq!(
            config.notifier.startup_message.as_deref(),
            Some("monitor online")
        );
        assert_eq!(config.engine.history_capacity, 50);
        assert!(!config.engine.notify_on_initial_danger);
        assert_eq!(config.engine.queue_capacity, 64);
        assert_eq!(config.status.unwrap().port, 9090);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = MonitorConfig::test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.mqtt.reading_topic, DEFAULT_READING_TOPIC);
        assert_eq!(config.mqtt.alert_topic, DEFAULT_ALERT_TOPIC);
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.notifier.timeout_secs, 5);
        assert_eq!(config.engine, EngineSection::default());
        assert_eq!(config.engine.history_capacity, 200);
        assert_eq!(config.engine.sample_interval_secs, 20);
        assert!(config.engine.notify_on_initial_danger);
        assert!(config.status.is_none());
    }

    #[test]
    fn test_invalid_broker_scheme() {
        let mut config = MonitorConfig::test_config();
        config.mqtt.broker_url = "http://localhost:1883".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        config.mqtt.broker_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_topics_rejected() {
        let mut config = MonitorConfig::test_config();
        config.mqtt.alert_topic = config.mqtt.reading_topic.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = MonitorConfig::test_config();
        config.engine.history_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::test_config();
        config.engine.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_notifier_endpoint_must_be_http() {
        let mut config = MonitorConfig::test_config();
        config.notifier.endpoint = "ftp://example.com/send".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_api_key_env() {
        let mut config = MonitorConfig::test_config();
        config.notifier.api_key_env = "GASMON_SURELY_UNSET_VARIABLE".to_string();
        assert!(matches!(
            config.get_notifier_api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }
}
