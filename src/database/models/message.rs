use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A message published to a hub on behalf of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SentMessage {
    pub id: i64,
    pub topic: String,
    #[serde(with = "payload")]
    pub message: Vec<u8>,
    pub hub_id: i64,
    pub user_id: i64,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSentMessage {
    pub topic: String,
    pub message: Vec<u8>,
    pub hub_id: i64,
    pub user_id: i64,
}

/// A message a hub delivered through the broker
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReceivedMessage {
    pub id: i64,
    pub topic: String,
    pub meta: Json<HashMap<String, String>>,
    #[serde(with = "payload")]
    pub message: Vec<u8>,
    pub hub_id: i64,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReceivedMessage {
    pub topic: String,
    pub meta: HashMap<String, String>,
    pub message: Vec<u8>,
    pub hub_id: i64,
}

/// Raw message bytes travel as standard base64 in JSON
mod payload {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
