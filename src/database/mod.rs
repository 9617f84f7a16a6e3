//! Persistence layer: the `Store` trait and its Postgres and in-memory backends.
//!
//! Failures a client can cause (duplicates, missing rows) come back as a tagged
//! [`DataError`] so handlers can pick a status; everything else is a backend
//! failure and ends up as a 500.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use models::{App, Hub, NewReceivedMessage, NewSentMessage, NewUser, ReceivedMessage, SentMessage, Token, User};

pub const UNIQUE_VIOLATION: &str = "unique_violation";
pub const RECORD_NOT_FOUND: &str = "record_not_found";
pub const FOREIGN_KEY_VIOLATION: &str = "foreign_key_violation";
pub const NO_MESSAGES: &str = "no_messages";

/// Client-caused data failure with a machine code and a description
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {desc}")]
pub struct DataError {
    pub code: String,
    pub desc: String,
}

impl DataError {
    pub fn new(code: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            desc: desc.into(),
        }
    }

    pub fn unique_violation(desc: impl Into<String>) -> Self {
        Self::new(UNIQUE_VIOLATION, desc)
    }

    pub fn not_found(desc: impl Into<String>) -> Self {
        Self::new(RECORD_NOT_FOUND, desc)
    }

    pub fn foreign_key_violation(entity: &str) -> Self {
        Self::new(FOREIGN_KEY_VIOLATION, format!("{} references a missing record", entity))
    }

    pub fn no_messages() -> Self {
        Self::new(NO_MESSAGES, "no messages")
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// The tagged data error, if this is one
    pub fn data(&self) -> Option<&DataError> {
        match self {
            StoreError::Data(err) => Some(err),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Cheap round trip used by the health check
    async fn ping(&self) -> StoreResult<()>;

    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    /// Look a user up by username or email
    async fn user_by_login(&self, login: &str) -> StoreResult<User>;

    async fn insert_token(&self, user_id: i64, expires_in: i64) -> StoreResult<Token>;
    async fn token(&self, id: i64) -> StoreResult<Token>;
    /// Set `revoked_at` if not already set and return the record
    async fn revoke_token(&self, id: i64) -> StoreResult<Token>;

    async fn insert_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub>;
    async fn hub_by_slug(&self, slug: &str) -> StoreResult<Hub>;
    async fn hub_slugs_for_user(&self, user_id: i64) -> StoreResult<Vec<String>>;
    /// Delete a hub only if `user_id` owns it, together with its apps and messages
    async fn delete_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub>;

    async fn insert_app(&self, slug: &str, hub_id: i64) -> StoreResult<App>;
    async fn app_slugs_for_hub(&self, hub_id: i64) -> StoreResult<Vec<String>>;
    async fn delete_app(&self, slug: &str, hub_id: i64) -> StoreResult<App>;

    async fn insert_sent_message(&self, message: NewSentMessage) -> StoreResult<SentMessage>;
    async fn insert_received_message(&self, message: NewReceivedMessage) -> StoreResult<ReceivedMessage>;
    /// Newest received message on `topic` across the hubs `user_id` owns
    async fn last_received_message(&self, topic: &str, user_id: i64) -> StoreResult<ReceivedMessage>;
}
