//! Tests for logging configuration and format parsing

use gasmon::observability::logging::{parse_level, LogFormat};
use gasmon::{lifecycle_span, mqtt_span, notify_span};
use tracing::Level;

#[test]
fn test_log_format_parse_is_case_insensitive() {
    assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
    assert_eq!(LogFormat::parse("Compact"), LogFormat::Compact);
    assert_eq!(LogFormat::parse("json"), LogFormat::Json);
}

#[test]
fn test_log_format_parse_invalid_defaults_to_json() {
    // Unknown formats fall back to JSON for production safety
    for input in ["invalid", "", "xml", "  pretty  "] {
        assert_eq!(LogFormat::parse(input), LogFormat::Json, "input: {input:?}");
    }
}

#[test]
fn test_log_level_parsing() {
    assert_eq!(parse_level("error"), Level::ERROR);
    assert_eq!(parse_level("WARN"), Level::WARN);
    assert_eq!(parse_level("debug"), Level::DEBUG);
    assert_eq!(parse_level("trace"), Level::TRACE);
    assert_eq!(parse_level("verbose"), Level::INFO);
    assert_eq!(parse_level(""), Level::INFO);
}

#[test]
fn test_span_macros_accept_structured_fields() {
    let mqtt = mqtt_span!(broker = "mqtt://localhost:1883", attempt = 3);
    let notify = notify_span!(kind = "alert");
    let lifecycle = lifecycle_span!(phase = "start");

    // Entering spans without a subscriber must be harmless
    let _guard = mqtt.enter();
    drop(notify.enter());
    drop(lifecycle.enter());
}
