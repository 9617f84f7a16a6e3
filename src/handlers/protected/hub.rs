// handlers/protected/hub.rs - /api/v0/hub handlers

use axum::extract::Request;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::info;

use crate::handlers::{FormParams, Outcome};
use crate::middleware::ApiResponse;
use crate::router::Context;

#[derive(Debug, Serialize)]
pub struct HubList {
    pub hub: Vec<String>,
}

/// POST /api/v0/hub?slug= - register a hub for the caller
pub async fn create(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let params = FormParams::from_request(req).await?;
    let slug = params.require("slug")?;

    let hub = store.insert_hub(slug, user_id).await?;
    info!("User {} registered hub {}", user_id, hub.slug);
    Ok(ApiResponse::created(hub).into_response())
}

/// GET /api/v0/hub - slugs of the caller's hubs
pub async fn list(_req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;

    let hub = store.hub_slugs_for_user(user_id).await?;
    Ok(ApiResponse::ok(HubList { hub }).into_response())
}

/// DELETE /api/v0/hub?slug= - remove one of the caller's hubs
pub async fn delete(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let params = FormParams::from_request(req).await?;
    let slug = params.require("slug")?;

    // Ownership is part of the delete itself; a hub of another user is "not found"
    let hub = store.delete_hub(slug, user_id).await?;
    info!("User {} deleted hub {}", user_id, hub.slug);
    Ok(ApiResponse::ok(hub).into_response())
}
