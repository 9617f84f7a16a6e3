//! Pub/sub broker seam.
//!
//! Handlers publish outbound messages to a hub through [`Broker::publish`]; the
//! dispatcher consumes inbound deliveries through [`Broker::subscribe`]. Topics
//! are `/`-separated levels and subscriptions use MQTT-style filters where `+`
//! matches one level and a trailing `#` matches the rest.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub mod dispatcher;
mod mqtt;

pub use mqtt::MqttBroker;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("message has no topic")]
    MissingTopic,

    #[error("hub slug required to publish")]
    MissingHub,

    #[error("invalid topic filter '{0}'")]
    InvalidFilter(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid broker url '{0}'")]
    InvalidUrl(String),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Application message exchanged with hubs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub meta: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl Message {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn topic(&self) -> Option<&str> {
        self.meta.get("topic").map(String::as_str).filter(|t| !t.is_empty())
    }
}

/// Raw message as it travels through the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Topic a message for `hub` is published on
pub fn hub_topic(hub: &str, topic: &str) -> String {
    format!("hub/{}/{}", hub, topic)
}

/// Wire form of `message` addressed to `hub`
pub fn outbound(message: &Message, hub: &str) -> Result<Delivery, BrokerError> {
    if hub.is_empty() {
        return Err(BrokerError::MissingHub);
    }
    let topic = message.topic().ok_or(BrokerError::MissingTopic)?;
    Ok(Delivery {
        topic: hub_topic(hub, topic),
        payload: message.encode()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    levels: Vec<String>,
}

impl TopicFilter {
    pub fn parse(filter: &str) -> Result<Self, BrokerError> {
        let levels: Vec<String> = filter.split('/').map(String::from).collect();
        let last = levels.len() - 1;

        for (i, level) in levels.iter().enumerate() {
            let wildcard_misused = match level.as_str() {
                "#" => i != last,
                "+" => false,
                other => other.contains('+') || other.contains('#'),
            };
            if filter.is_empty() || wildcard_misused {
                return Err(BrokerError::InvalidFilter(filter.to_string()));
            }
        }

        Ok(Self { levels })
    }

    pub fn matches(&self, topic: &str) -> bool {
        let mut parts = topic.split('/');
        for level in &self.levels {
            match (level.as_str(), parts.next()) {
                ("#", _) => return true,
                ("+", Some(_)) => continue,
                (expected, Some(part)) if expected == part => continue,
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

/// Inbound deliveries matching one filter
pub struct Subscription {
    filter: TopicFilter,
    receiver: broadcast::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(filter: TopicFilter, receiver: broadcast::Receiver<Delivery>) -> Self {
        Self { filter, receiver }
    }

    /// Next matching delivery, or `None` once the broker has shut down. A slow
    /// subscriber skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<Delivery> {
        loop {
            match self.receiver.recv().await {
                Ok(delivery) if self.filter.matches(&delivery.topic) => return Some(delivery),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscription lagged, skipped {} deliveries", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Publish `message` to the hub with slug `hub`, on the topic named by its meta
    async fn publish(&self, message: &Message, hub: &str) -> Result<(), BrokerError>;

    fn subscribe(&self, filter: &str) -> Result<Subscription, BrokerError>;
}

/// In-process broker over a broadcast channel. Also the inbound fan-out
/// behind [`MqttBroker`].
#[derive(Clone)]
pub struct LocalBroker {
    sender: broadcast::Sender<Delivery>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Inject a delivery as if a hub had sent it
    pub fn deliver(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.send(Delivery {
            topic: topic.into(),
            payload: payload.into(),
        });
    }

    fn send(&self, delivery: Delivery) {
        match self.sender.send(delivery) {
            Ok(count) => debug!(receivers = count, "Delivery broadcast"),
            Err(broadcast::error::SendError(delivery)) => {
                debug!(topic = %delivery.topic, "No subscribers for delivery")
            }
        }
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn publish(&self, message: &Message, hub: &str) -> Result<(), BrokerError> {
        self.send(outbound(message, hub)?);
        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<Subscription, BrokerError> {
        Ok(Subscription::new(TopicFilter::parse(filter)?, self.sender.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_match_levels() {
        let filter = TopicFilter::parse("data/hub/+/+").unwrap();
        assert!(filter.matches("data/hub/abcd/temp"));
        assert!(!filter.matches("data/hub/abcd"));
        assert!(!filter.matches("data/hub/abcd/temp/extra"));
        assert!(!filter.matches("hub/abcd/temp"));

        let rest = TopicFilter::parse("hub/#").unwrap();
        assert!(rest.matches("hub/abcd/temp"));
        assert!(rest.matches("hub"));
        assert!(!rest.matches("data/hub/abcd"));
    }

    #[test]
    fn bad_filters_are_refused() {
        assert!(TopicFilter::parse("").is_err());
        assert!(TopicFilter::parse("a/#/b").is_err());
        assert!(TopicFilter::parse("a/b+").is_err());
    }

    #[test]
    fn message_topic_comes_from_meta() {
        let msg = Message::decode(br#"{"meta":{"topic":"temp"},"body":{"c":21}}"#).unwrap();
        assert_eq!(msg.topic(), Some("temp"));
        assert_eq!(msg.body, json!({"c": 21}));

        let bare = Message::decode(b"{}").unwrap();
        assert_eq!(bare.topic(), None);
        assert!(Message::decode(b"not json").is_err());
    }

    #[tokio::test]
    async fn publish_goes_to_hub_topic() {
        let broker = LocalBroker::new();
        let mut sub = broker.subscribe("hub/+/+").unwrap();

        let mut msg = Message::default();
        msg.meta.insert("topic".into(), "temp".into());
        broker.publish(&msg, "abcd").await.unwrap();

        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.topic, "hub/abcd/temp");
        assert_eq!(Message::decode(&delivery.payload).unwrap(), msg);
    }

    #[tokio::test]
    async fn publish_needs_topic_and_hub() {
        let broker = LocalBroker::new();
        let msg = Message::default();
        assert!(matches!(broker.publish(&msg, "abcd").await, Err(BrokerError::MissingTopic)));

        let mut msg = msg;
        msg.meta.insert("topic".into(), "temp".into());
        assert!(matches!(broker.publish(&msg, "").await, Err(BrokerError::MissingHub)));
    }

    #[tokio::test]
    async fn subscription_skips_other_topics_and_ends_with_broker() {
        let broker = LocalBroker::new();
        let mut sub = broker.subscribe("data/hub/+/+").unwrap();

        broker.deliver("hub/abcd/temp", "ignored");
        broker.deliver("data/hub/abcd/temp", "kept");
        drop(broker);

        assert_eq!(sub.recv().await.unwrap().payload, b"kept");
        assert!(sub.recv().await.is_none());
    }
}
