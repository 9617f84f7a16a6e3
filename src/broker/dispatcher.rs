// Collects messages hubs send through the broker and stores them

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Broker, BrokerError, Delivery, Message, Subscription};
use crate::database::models::NewReceivedMessage;
use crate::database::{Store, StoreError};

/// Inbound hub data: `data/hub/<slug>/<topic>`
pub const HUB_DATA_FILTER: &str = "data/hub/+/+";

static HUB_DATA_TOPIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data/hub/([^/]+)/([^/]+)$").expect("static regex is valid"));

/// Split a hub data topic into (hub slug, sub-topic)
pub fn parse_hub_topic(topic: &str) -> Option<(&str, &str)> {
    let caps = HUB_DATA_TOPIC.captures(topic)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Subscribe to hub data and store each delivery in the background. The task
/// ends when the broker shuts down.
pub fn start(store: Arc<dyn Store>, broker: &dyn Broker) -> Result<JoinHandle<()>, BrokerError> {
    let subscription = broker.subscribe(HUB_DATA_FILTER)?;
    info!("Dispatcher subscribed to {}", HUB_DATA_FILTER);
    Ok(tokio::spawn(run(store, subscription)))
}

async fn run(store: Arc<dyn Store>, mut subscription: Subscription) {
    while let Some(delivery) = subscription.recv().await {
        if let Err(err) = store_delivery(store.as_ref(), &delivery).await {
            error!("Dispatcher failed to store message on {}: {}", delivery.topic, err);
        }
    }
    info!("Dispatcher stopped, broker closed");
}

/// Store one delivery. Deliveries for malformed topics or unknown hubs are
/// dropped with a warning and are not an error.
pub async fn store_delivery(store: &dyn Store, delivery: &Delivery) -> Result<(), StoreError> {
    let Some((slug, topic)) = parse_hub_topic(&delivery.topic) else {
        warn!("Dispatcher dropped message without a hub: {}", delivery.topic);
        return Ok(());
    };

    let hub = match store.hub_by_slug(slug).await {
        Ok(hub) => hub,
        Err(StoreError::Data(_)) => {
            warn!("Dispatcher dropped message for unknown hub {}", slug);
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let meta = match Message::decode(&delivery.payload) {
        Ok(message) => message.meta,
        Err(err) => {
            debug!("Dispatcher could not decode message on {}: {}", delivery.topic, err);
            Default::default()
        }
    };

    store
        .insert_received_message(NewReceivedMessage {
            topic: topic.to_string(),
            meta,
            message: delivery.payload.clone(),
            hub_id: hub.id,
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalBroker;
    use crate::database::models::NewUser;
    use crate::database::MemoryStore;
    use std::time::Duration;

    async fn store_with_hub(slug: &str) -> (Arc<MemoryStore>, i64) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .insert_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                encrypted_password: "hash".into(),
            })
            .await
            .unwrap();
        store.insert_hub(slug, user.id).await.unwrap();
        (store, user.id)
    }

    #[test]
    fn hub_topics() {
        assert_eq!(parse_hub_topic("data/hub/abcd/temp"), Some(("abcd", "temp")));
        assert_eq!(parse_hub_topic("data/hub/abcd"), None);
        assert_eq!(parse_hub_topic("hub/abcd/temp"), None);
    }

    #[tokio::test]
    async fn delivery_is_stored_under_sub_topic() {
        let (store, user_id) = store_with_hub("abcd").await;
        let delivery = Delivery {
            topic: "data/hub/abcd/temp".into(),
            payload: br#"{"meta":{"unit":"c"},"body":21}"#.to_vec(),
        };

        store_delivery(store.as_ref(), &delivery).await.unwrap();

        let last = store.last_received_message("temp", user_id).await.unwrap();
        assert_eq!(last.meta.0.get("unit").map(String::as_str), Some("c"));
        assert_eq!(last.message, delivery.payload);
    }

    #[tokio::test]
    async fn undecodable_payload_is_kept_with_empty_meta() {
        let (store, user_id) = store_with_hub("abcd").await;
        let delivery = Delivery {
            topic: "data/hub/abcd/raw".into(),
            payload: b"\x01\x02".to_vec(),
        };

        store_delivery(store.as_ref(), &delivery).await.unwrap();

        let last = store.last_received_message("raw", user_id).await.unwrap();
        assert!(last.meta.0.is_empty());
    }

    #[tokio::test]
    async fn unknown_hub_is_dropped() {
        let (store, user_id) = store_with_hub("abcd").await;
        let delivery = Delivery {
            topic: "data/hub/nope/temp".into(),
            payload: b"{}".to_vec(),
        };

        store_delivery(store.as_ref(), &delivery).await.unwrap();
        assert!(store.last_received_message("temp", user_id).await.is_err());
    }

    #[tokio::test]
    async fn background_task_stores_and_stops() {
        let (store, user_id) = store_with_hub("abcd").await;
        let broker = LocalBroker::new();
        let handle = start(store.clone(), &broker).unwrap();

        broker.deliver("data/hub/abcd/temp", r#"{"body":21}"#);
        drop(broker);

        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(store.last_received_message("temp", user_id).await.is_ok());
    }
}
