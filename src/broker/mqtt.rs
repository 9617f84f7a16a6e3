// MQTT broker client. Outbound messages go straight to the broker; inbound
// publishes are fanned out to subscriptions through a LocalBroker.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::{outbound, Broker, BrokerError, LocalBroker, Message, Subscription, TopicFilter};
use crate::config::BrokerConfig;

const DEFAULT_PORT: u16 = 1883;
const MIN_KEEP_ALIVE_SECS: u64 = 5;
const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub struct MqttBroker {
    client: AsyncClient,
    inbound: LocalBroker,
    filters: Arc<Mutex<Vec<String>>>,
}

impl MqttBroker {
    /// Start a client for `config.url`. The returned task keeps the connection
    /// alive, reconnecting and restoring subscriptions after a drop.
    pub fn connect(config: &BrokerConfig) -> Result<(Self, JoinHandle<()>), BrokerError> {
        let options = Self::options(config)?;
        let (host, port) = options.broker_address();
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let broker = Self {
            client: client.clone(),
            inbound: LocalBroker::new(),
            filters: Arc::default(),
        };
        info!("Connecting to MQTT broker at {}:{}", host, port);
        let handle = tokio::spawn(drive(eventloop, client, broker.inbound.clone(), broker.filters.clone()));
        Ok((broker, handle))
    }

    pub fn options(config: &BrokerConfig) -> Result<MqttOptions, BrokerError> {
        let raw = config.url.as_deref().unwrap_or_default();
        let invalid = || BrokerError::InvalidUrl(raw.to_string());

        let url = Url::parse(raw).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "mqtt" | "tcp") {
            return Err(invalid());
        }
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

        let mut options = MqttOptions::new(config.client_id.clone(), host, url.port().unwrap_or(DEFAULT_PORT));
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS)));
        if !url.username().is_empty() {
            options.set_credentials(url.username(), url.password().unwrap_or_default());
        }
        Ok(options)
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn publish(&self, message: &Message, hub: &str) -> Result<(), BrokerError> {
        let delivery = outbound(message, hub)?;
        self.client
            .publish(delivery.topic, QoS::AtLeastOnce, false, delivery.payload)
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))
    }

    fn subscribe(&self, filter: &str) -> Result<Subscription, BrokerError> {
        let parsed = TopicFilter::parse(filter)?;
        self.client
            .try_subscribe(filter, QoS::AtMostOnce)
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(filter.to_string());
        Ok(Subscription::new(parsed, self.inbound.sender.subscribe()))
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    inbound: LocalBroker,
    filters: Arc<Mutex<Vec<String>>>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(topic = %publish.topic, "MQTT message received");
                inbound.deliver(publish.topic, publish.payload.to_vec());
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                let filters = filters.lock().unwrap_or_else(PoisonError::into_inner).clone();
                for filter in filters {
                    if let Err(err) = client.try_subscribe(filter.as_str(), QoS::AtMostOnce) {
                        warn!("Failed to resubscribe to {}: {}", filter, err);
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!("MQTT connection error: {}, retrying in {:?}", err, RECONNECT_DELAY);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BrokerConfig {
        BrokerConfig {
            url: Some(url.to_string()),
            client_id: "cloud-test".to_string(),
            keep_alive_secs: 1,
        }
    }

    #[test]
    fn options_from_url() {
        let options = MqttBroker::options(&config("mqtt://user:pw@broker.local:1884")).unwrap();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "cloud-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(MIN_KEEP_ALIVE_SECS));

        let options = MqttBroker::options(&config("tcp://broker.local")).unwrap();
        assert_eq!(options.broker_address().1, DEFAULT_PORT);
    }

    #[test]
    fn bad_urls_are_refused() {
        for url in ["", "broker.local:1883", "http://broker.local", "mqtt://"] {
            assert!(
                matches!(MqttBroker::options(&config(url)), Err(BrokerError::InvalidUrl(_))),
                "accepted {}",
                url
            );
        }
    }

    #[tokio::test]
    async fn subscriptions_are_remembered_for_reconnects() {
        // Nothing listens on this port; the client keeps retrying in the background
        let port = portpicker::pick_unused_port().unwrap();
        let (broker, handle) = MqttBroker::connect(&config(&format!("mqtt://127.0.0.1:{}", port))).unwrap();

        assert!(matches!(broker.subscribe("a/#/b"), Err(BrokerError::InvalidFilter(_))));
        broker.subscribe("data/hub/+/+").unwrap();
        assert_eq!(*broker.filters.lock().unwrap(), vec!["data/hub/+/+".to_string()]);
        handle.abort();
    }
}
