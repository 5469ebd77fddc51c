//! Pure message routing and payload decoding for MQTT events
//!
//! Nothing in here performs I/O. The listener feeds every polled event
//! through [`MessageHandler::route_mqtt_event`] and acts on the result.

use super::super::Channel;
use crate::config::MqttSection;
use crate::error::DecodeError;
use rumqttc::v5::Event;
use rumqttc::v5::mqttbytes::v5::{Packet, SubscribeReasonCode};
use tracing::debug;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                },
                Packet::Disconnect(_) => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    rejected: suback
                        .return_codes
                        .iter()
                        .filter(|code| !matches!(code, SubscribeReasonCode::Success(_)))
                        .count(),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Map a topic to the channel it carries, if it is one we subscribed to
    pub fn resolve_channel(topic: &str, config: &MqttSection) -> Option<Channel> {
        if topic == config.reading_topic {
            Some(Channel::Reading)
        } else if topic == config.alert_topic {
            Some(Channel::Alert)
        } else {
            debug!("Ignoring message on unexpected topic: {}", topic);
            None
        }
    }

    /// Decode a sensor payload: UTF-8 text holding a decimal number.
    ///
    /// Surrounding whitespace is ignored. The result may still be non-finite
    /// (`"NaN"`, `"inf"`); rejecting those is up to the engine.
    pub fn decode_payload(payload: &[u8]) -> Result<f64, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
        let trimmed = text.trim();
        trimmed
            .parse::<f64>()
            .map_err(|_| DecodeError::NotANumber(truncate_for_log(trimmed)))
    }

    /// Topics subscribed on every (re)connection, reading channel first
    pub fn build_subscription_topics(config: &MqttSection) -> Vec<String> {
        vec![config.reading_topic.clone(), config.alert_topic.clone()]
    }
}

fn truncate_for_log(text: &str) -> String {
    const MAX: usize = 64;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone, PartialEq)]
pub enum EventRoute {
    /// Broker accepted the session, subscriptions must be (re)issued
    ConnectionAcknowledged,
    /// Message received on a subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// Broker sent a disconnect
    Disconnected,
    /// Subscription acknowledged; `rejected` counts refused filters
    SubscriptionConfirmed { packet_id: u16, rejected: usize },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled by rumqttc)
    OutgoingEvent,
}
