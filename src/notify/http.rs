//! HTTP GET messaging gateway notifier
//!
//! Delivers text through a gateway of the form
//! `{endpoint}?phone={recipient}&text={message}&apikey={key}`.

use super::Notifier;
use crate::config::{ConfigError, MonitorConfig};
use crate::error::{MonitorError, sanitize_error_message};
use crate::monitor::NotificationOutcome;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Body excerpt kept in the notification log
const BODY_EXCERPT_CHARS: usize = 200;

/// Keys shorter than this are masked only inside the `apikey=` parameter
const MIN_BARE_KEY_REDACT_LEN: usize = 8;

/// HTTP notifier configuration
#[derive(Clone)]
pub struct HttpNotifierConfig {
    pub endpoint: String,
    pub recipient: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpNotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNotifierConfig")
            .field("endpoint", &self.endpoint)
            .field("recipient", &self.recipient)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpNotifierConfig {
    /// Build from the `[notifier]` section, resolving the API key from the environment
    pub fn from_monitor_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: config.notifier.endpoint.clone(),
            recipient: config.notifier.recipient.clone(),
            api_key: config.get_notifier_api_key()?,
            timeout: config.notifier.timeout(),
        })
    }
}

/// Notifier backed by a GET-style messaging gateway
pub struct HttpNotifier {
    config: HttpNotifierConfig,
    endpoint: Url,
    client: Client,
}

impl HttpNotifier {
    pub fn new(config: HttpNotifierConfig) -> Result<Self, MonitorError> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            MonitorError::notification(format!(
                "Invalid notifier endpoint '{}': {e}",
                config.endpoint
            ))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MonitorError::notification(e.to_string()))?;

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    /// Full request URL with URL-encoded query parameters
    pub fn request_url(&self, text: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("phone", &self.config.recipient)
            .append_pair("text", text)
            .append_pair("apikey", &self.config.api_key);
        url
    }

    /// Strip the API key from arbitrary text
    fn redact(&self, text: &str) -> String {
        let api_key = &self.config.api_key;
        let redacted = if api_key.len() >= MIN_BARE_KEY_REDACT_LEN {
            text.replace(api_key.as_str(), "***")
        } else {
            text.to_string()
        };
        sanitize_error_message(&redacted)
    }
}

fn body_excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, text: &str) -> NotificationOutcome {
        let url = self.request_url(text);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let detail = self.redact(&format!(
                    "Request failed: {} (is_connect: {}, is_timeout: {})",
                    e,
                    e.is_connect(),
                    e.is_timeout()
                ));
                warn!("Notification delivery error: {}", detail);
                return NotificationOutcome::failed(detail);
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = self.redact(&format!("HTTP {} - {}", status.as_u16(), body_excerpt(&body)));

        if status.is_success() {
            debug!(status = status.as_u16(), "Notification delivered");
            NotificationOutcome::delivered(detail)
        } else {
            warn!(status = status.as_u16(), "Notification rejected by gateway");
            NotificationOutcome::failed(detail)
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> HttpNotifier {
        HttpNotifier::new(HttpNotifierConfig {
            endpoint: "https://api.example.com/whatsapp.php".to_string(),
            recipient: "5511999999999".to_string(),
            api_key: "9991859".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_request_url_encodes_text() {
        let url = notifier().request_url("🚨 GAS ALERT\nLPG: 2100.00 ppm & rising");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(url.path(), "/whatsapp.php");
        assert_eq!(pairs[0], ("phone".to_string(), "5511999999999".to_string()));
        assert_eq!(
            pairs[1],
            (
                "text".to_string(),
                "🚨 GAS ALERT\nLPG: 2100.00 ppm & rising".to_string()
            )
        );
        assert_eq!(pairs[2], ("apikey".to_string(), "9991859".to_string()));
        assert!(!url.as_str().contains(' '));
        assert!(!url.as_str().contains('\n'));
    }

    #[test]
    fn test_redact_removes_api_key() {
        let notifier = notifier();
        let redacted = notifier.redact("failed for https://x/?phone=1&apikey=9991859&text=hi");
        assert!(!redacted.contains("9991859"));
        assert!(redacted.contains("apikey=***"));
    }

    #[test]
    fn test_redact_short_key_leaves_other_digits_alone() {
        let notifier = HttpNotifier::new(HttpNotifierConfig {
            endpoint: "https://api.example.com/whatsapp.php".to_string(),
            recipient: "5511999999999".to_string(),
            api_key: "200".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let redacted = notifier.redact("HTTP 200 - queued for https://x/?apikey=200");
        assert!(redacted.starts_with("HTTP 200 - queued"));
        assert!(redacted.ends_with("apikey=***"));
    }

    #[test]
    fn test_redact_long_key_anywhere() {
        let notifier = HttpNotifier::new(HttpNotifierConfig {
            endpoint: "https://api.example.com/whatsapp.php".to_string(),
            recipient: "5511999999999".to_string(),
            api_key: "a1b2c3d4e5".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let redacted = notifier.redact("gateway echoed a1b2c3d4e5 back");
        assert_eq!(redacted, "gateway echoed *** back");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = HttpNotifier::new(HttpNotifierConfig {
            endpoint: "not a url".to_string(),
            recipient: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(MonitorError::Notification { .. })));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug = format!("{:?}", notifier().config);
        assert!(!debug.contains("9991859"));
    }

    #[test]
    fn test_body_excerpt_is_char_safe() {
        let body = "é".repeat(500);
        assert_eq!(body_excerpt(&body).chars().count(), 200);
        assert_eq!(body_excerpt("ok"), "ok");
    }
}
