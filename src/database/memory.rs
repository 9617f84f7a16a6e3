use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::models::{App, Hub, NewReceivedMessage, NewSentMessage, NewUser, ReceivedMessage, SentMessage, Token, User};
use super::{DataError, Store, StoreResult};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tokens: Vec<Token>,
    hubs: Vec<Hub>,
    apps: Vec<App>,
    sent: Vec<SentMessage>,
    received: Vec<ReceivedMessage>,
    last_id: i64,
}

impl Tables {
    // One sequence shared by every table; IDs stay unique and increasing
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user_exists(&self, id: i64) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    fn hub_exists(&self, id: i64) -> bool {
        self.hubs.iter().any(|h| h.id == id)
    }
}

/// In-process store with the same constraints as the Postgres schema
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(DataError::unique_violation("user exists").into());
        }

        let now = Utc::now();
        let record = User {
            id: tables.next_id(),
            username: user.username,
            email: user.email,
            encrypted_password: user.encrypted_password,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(record.clone());
        Ok(record)
    }

    async fn user_by_login(&self, login: &str) -> StoreResult<User> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|u| u.username == login)
            .or_else(|| tables.users.iter().find(|u| u.email == login))
            .cloned()
            .ok_or_else(|| DataError::not_found("user not found").into())
    }

    async fn insert_token(&self, user_id: i64, expires_in: i64) -> StoreResult<Token> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(user_id) {
            return Err(DataError::foreign_key_violation("token").into());
        }

        let record = Token {
            id: tables.next_id(),
            user_id,
            expires_in,
            created_at: Utc::now(),
            revoked_at: None,
        };
        tables.tokens.push(record.clone());
        Ok(record)
    }

    async fn token(&self, id: i64) -> StoreResult<Token> {
        let tables = self.tables.read().await;
        tables
            .tokens
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| DataError::not_found("token not found").into())
    }

    async fn revoke_token(&self, id: i64) -> StoreResult<Token> {
        let mut tables = self.tables.write().await;
        let token = tables
            .tokens
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| DataError::not_found("token not found"))?;

        token.revoked_at.get_or_insert_with(Utc::now);
        Ok(token.clone())
    }

    async fn insert_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub> {
        let mut tables = self.tables.write().await;
        if !tables.user_exists(user_id) {
            return Err(DataError::foreign_key_violation("hub").into());
        }
        if tables.hubs.iter().any(|h| h.slug == slug) {
            return Err(DataError::unique_violation("hub exists").into());
        }

        let now = Utc::now();
        let record = Hub {
            id: tables.next_id(),
            slug: slug.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.hubs.push(record.clone());
        Ok(record)
    }

    async fn hub_by_slug(&self, slug: &str) -> StoreResult<Hub> {
        let tables = self.tables.read().await;
        tables
            .hubs
            .iter()
            .find(|h| h.slug == slug)
            .cloned()
            .ok_or_else(|| DataError::not_found("hub not found").into())
    }

    async fn hub_slugs_for_user(&self, user_id: i64) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .hubs
            .iter()
            .filter(|h| h.user_id == user_id)
            .map(|h| h.slug.clone())
            .collect())
    }

    async fn delete_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub> {
        let mut tables = self.tables.write().await;
        let index = tables
            .hubs
            .iter()
            .position(|h| h.slug == slug && h.user_id == user_id)
            .ok_or_else(|| DataError::not_found("hub not found"))?;

        let hub = tables.hubs.remove(index);
        tables.apps.retain(|a| a.hub_id != hub.id);
        tables.sent.retain(|m| m.hub_id != hub.id);
        tables.received.retain(|m| m.hub_id != hub.id);
        Ok(hub)
    }

    async fn insert_app(&self, slug: &str, hub_id: i64) -> StoreResult<App> {
        let mut tables = self.tables.write().await;
        if !tables.hub_exists(hub_id) {
            return Err(DataError::foreign_key_violation("app").into());
        }
        if tables.apps.iter().any(|a| a.slug == slug && a.hub_id == hub_id) {
            return Err(DataError::unique_violation("app exists").into());
        }

        let now = Utc::now();
        let record = App {
            id: tables.next_id(),
            slug: slug.to_string(),
            hub_id,
            created_at: now,
            updated_at: now,
        };
        tables.apps.push(record.clone());
        Ok(record)
    }

    async fn app_slugs_for_hub(&self, hub_id: i64) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(tables
            .apps
            .iter()
            .filter(|a| a.hub_id == hub_id)
            .map(|a| a.slug.clone())
            .collect())
    }

    async fn delete_app(&self, slug: &str, hub_id: i64) -> StoreResult<App> {
        let mut tables = self.tables.write().await;
        let index = tables
            .apps
            .iter()
            .position(|a| a.slug == slug && a.hub_id == hub_id)
            .ok_or_else(|| DataError::not_found("app not found"))?;
        Ok(tables.apps.remove(index))
    }

    async fn insert_sent_message(&self, message: NewSentMessage) -> StoreResult<SentMessage> {
        let mut tables = self.tables.write().await;
        if !tables.hub_exists(message.hub_id) || !tables.user_exists(message.user_id) {
            return Err(DataError::foreign_key_violation("sent message").into());
        }

        let record = SentMessage {
            id: tables.next_id(),
            topic: message.topic,
            message: message.message,
            hub_id: message.hub_id,
            user_id: message.user_id,
            requested_at: Utc::now(),
        };
        tables.sent.push(record.clone());
        Ok(record)
    }

    async fn insert_received_message(&self, message: NewReceivedMessage) -> StoreResult<ReceivedMessage> {
        let mut tables = self.tables.write().await;
        if !tables.hub_exists(message.hub_id) {
            return Err(DataError::foreign_key_violation("received message").into());
        }

        let record = ReceivedMessage {
            id: tables.next_id(),
            topic: message.topic,
            meta: Json(message.meta),
            message: message.message,
            hub_id: message.hub_id,
            received_at: Utc::now(),
        };
        tables.received.push(record.clone());
        Ok(record)
    }

    async fn last_received_message(&self, topic: &str, user_id: i64) -> StoreResult<ReceivedMessage> {
        let tables = self.tables.read().await;
        let owned: Vec<i64> = tables
            .hubs
            .iter()
            .filter(|h| h.user_id == user_id)
            .map(|h| h.id)
            .collect();

        tables
            .received
            .iter()
            .filter(|m| m.topic == topic && owned.contains(&m.hub_id))
            .max_by_key(|m| (m.received_at, m.id))
            .cloned()
            .ok_or_else(|| DataError::no_messages().into())
    }
}
