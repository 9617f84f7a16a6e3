use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use super::models::{App, Hub, NewReceivedMessage, NewSentMessage, NewUser, ReceivedMessage, SentMessage, Token, User};
use super::{DataError, Store, StoreError, StoreResult};
use crate::config::DatabaseConfig;

const USER_COLUMNS: &str = "id, username, email, encrypted_password, created_at, updated_at";
const TOKEN_COLUMNS: &str = "id, user_id, expires_in, created_at, revoked_at";
const HUB_COLUMNS: &str = "id, slug, user_id, created_at, updated_at";
const APP_COLUMNS: &str = "id, slug, hub_id, created_at, updated_at";
const SENT_COLUMNS: &str = "id, topic, message, hub_id, user_id, requested_at";
const RECEIVED_COLUMNS: &str = "id, topic, meta, message, hub_id, received_at";

/// Postgres-backed store over a shared connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await?;

        info!("Connected to database (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

/// Translate constraint violations into tagged data errors
fn constraint(err: sqlx::Error, exists: &str, entity: &str) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        match db_err.code().as_deref() {
            Some("23505") => return DataError::unique_violation(exists).into(),
            Some("23503") => return DataError::foreign_key_violation(entity).into(),
            _ => {}
        }
    }
    StoreError::Backend(err)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (username, email, encrypted_password, created_at, updated_at) \
             VALUES ($1, $2, $3, now(), now()) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.encrypted_password)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "user exists", "user"))
    }

    async fn user_by_login(&self, login: &str) -> StoreResult<User> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1 \
             ORDER BY (username = $1) DESC, id LIMIT 1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("user not found").into())
    }

    async fn insert_token(&self, user_id: i64, expires_in: i64) -> StoreResult<Token> {
        let sql = format!(
            "INSERT INTO tokens (user_id, expires_in, created_at) VALUES ($1, $2, now()) RETURNING {}",
            TOKEN_COLUMNS
        );
        sqlx::query_as::<_, Token>(&sql)
            .bind(user_id)
            .bind(expires_in)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "token exists", "token"))
    }

    async fn token(&self, id: i64) -> StoreResult<Token> {
        let sql = format!("SELECT {} FROM tokens WHERE id = $1", TOKEN_COLUMNS);
        sqlx::query_as::<_, Token>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("token not found").into())
    }

    async fn revoke_token(&self, id: i64) -> StoreResult<Token> {
        let sql = format!(
            "UPDATE tokens SET revoked_at = COALESCE(revoked_at, now()) WHERE id = $1 RETURNING {}",
            TOKEN_COLUMNS
        );
        sqlx::query_as::<_, Token>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("token not found").into())
    }

    async fn insert_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub> {
        let sql = format!(
            "INSERT INTO hubs (slug, user_id, created_at, updated_at) VALUES ($1, $2, now(), now()) RETURNING {}",
            HUB_COLUMNS
        );
        sqlx::query_as::<_, Hub>(&sql)
            .bind(slug)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "hub exists", "hub"))
    }

    async fn hub_by_slug(&self, slug: &str) -> StoreResult<Hub> {
        let sql = format!("SELECT {} FROM hubs WHERE slug = $1", HUB_COLUMNS);
        sqlx::query_as::<_, Hub>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("hub not found").into())
    }

    async fn hub_slugs_for_user(&self, user_id: i64) -> StoreResult<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>("SELECT slug FROM hubs WHERE user_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs)
    }

    async fn delete_hub(&self, slug: &str, user_id: i64) -> StoreResult<Hub> {
        let sql = format!(
            "DELETE FROM hubs WHERE slug = $1 AND user_id = $2 RETURNING {}",
            HUB_COLUMNS
        );
        sqlx::query_as::<_, Hub>(&sql)
            .bind(slug)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("hub not found").into())
    }

    async fn insert_app(&self, slug: &str, hub_id: i64) -> StoreResult<App> {
        let sql = format!(
            "INSERT INTO apps (slug, hub_id, created_at, updated_at) VALUES ($1, $2, now(), now()) RETURNING {}",
            APP_COLUMNS
        );
        sqlx::query_as::<_, App>(&sql)
            .bind(slug)
            .bind(hub_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "app exists", "app"))
    }

    async fn app_slugs_for_hub(&self, hub_id: i64) -> StoreResult<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>("SELECT slug FROM apps WHERE hub_id = $1 ORDER BY id")
            .bind(hub_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs)
    }

    async fn delete_app(&self, slug: &str, hub_id: i64) -> StoreResult<App> {
        let sql = format!(
            "DELETE FROM apps WHERE slug = $1 AND hub_id = $2 RETURNING {}",
            APP_COLUMNS
        );
        sqlx::query_as::<_, App>(&sql)
            .bind(slug)
            .bind(hub_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::not_found("app not found").into())
    }

    async fn insert_sent_message(&self, message: NewSentMessage) -> StoreResult<SentMessage> {
        let sql = format!(
            "INSERT INTO sent_messages (topic, message, hub_id, user_id, requested_at) \
             VALUES ($1, $2, $3, $4, now()) RETURNING {}",
            SENT_COLUMNS
        );
        sqlx::query_as::<_, SentMessage>(&sql)
            .bind(&message.topic)
            .bind(&message.message)
            .bind(message.hub_id)
            .bind(message.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "sent message exists", "sent message"))
    }

    async fn insert_received_message(&self, message: NewReceivedMessage) -> StoreResult<ReceivedMessage> {
        let sql = format!(
            "INSERT INTO received_messages (topic, meta, message, hub_id, received_at) \
             VALUES ($1, $2, $3, $4, now()) RETURNING {}",
            RECEIVED_COLUMNS
        );
        sqlx::query_as::<_, ReceivedMessage>(&sql)
            .bind(&message.topic)
            .bind(Json(&message.meta))
            .bind(&message.message)
            .bind(message.hub_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| constraint(e, "received message exists", "received message"))
    }

    async fn last_received_message(&self, topic: &str, user_id: i64) -> StoreResult<ReceivedMessage> {
        let sql = "SELECT m.id, m.topic, m.meta, m.message, m.hub_id, m.received_at \
                   FROM received_messages m JOIN hubs h ON h.id = m.hub_id \
                   WHERE m.topic = $1 AND h.user_id = $2 \
                   ORDER BY m.received_at DESC, m.id DESC LIMIT 1";
        sqlx::query_as::<_, ReceivedMessage>(sql)
            .bind(topic)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DataError::no_messages().into())
    }
}
