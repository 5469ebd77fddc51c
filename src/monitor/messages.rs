//! Notification text templates

use super::tier::StatusTier;
use chrono::{DateTime, Local, Utc};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp the way it appears in notification text (local time)
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Tier change between two consecutive readings
pub fn tier_transition(
    from: StatusTier,
    to: StatusTier,
    value: f64,
    timestamp: &DateTime<Utc>,
) -> String {
    format!(
        "⚠️ Air quality changed tier!\n\nFrom: {}\nTo: {}\nLPG: {:.2} ppm\nTime: {}",
        from.label(),
        to.label(),
        value,
        format_timestamp(timestamp)
    )
}

/// First classified reading is already DANGER
pub fn initial_danger(value: f64, timestamp: &DateTime<Utc>) -> String {
    format!(
        "⚠️ Air quality entered CRITICAL level!\n\nFrom: NONE\nTo: {}\nLPG: {:.2} ppm\nTime: {}",
        StatusTier::Danger.label(),
        value,
        format_timestamp(timestamp)
    )
}

/// Discrete event from the alert channel
pub fn gas_alert(value: f64, timestamp: &DateTime<Utc>) -> String {
    format!(
        "🚨 GAS ALERT DETECTED 🚨\n\nLPG: {:.2} ppm\nTime: {}",
        value,
        format_timestamp(timestamp)
    )
}
