// handlers/protected/token.rs - DELETE /api/v0/user/token handler

use axum::extract::Request;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::handlers::Outcome;
use crate::middleware::ApiResponse;
use crate::router::Context;

#[derive(Debug, Serialize)]
pub struct Revoked {
    pub id: i64,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Revoke the token this request was made with
pub async fn revoke(_req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let principal = ctx.meta.principal()?;

    let token = store.revoke_token(principal.token_id).await?;
    info!("User {} revoked token {}", principal.user_id, token.id);
    Ok(ApiResponse::ok(Revoked {
        id: token.id,
        revoked_at: token.revoked_at,
    })
    .into_response())
}
