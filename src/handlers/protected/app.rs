// handlers/protected/app.rs - /api/v0/app handlers
//
// Apps live on a hub, named by the `hub` parameter, that the caller owns.

use axum::extract::Request;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::info;

use super::owned_hub;
use crate::error::ApiError;
use crate::handlers::{FormParams, HandlerError, Outcome};
use crate::middleware::ApiResponse;
use crate::router::Context;

#[derive(Debug, Serialize)]
pub struct AppList {
    pub app: Vec<String>,
}

fn app_slug(ctx: &Context) -> Result<String, ApiError> {
    ctx.params
        .get("slug")
        .map(str::to_string)
        .ok_or_else(|| ApiError::missing_param("slug"))
}

/// POST /api/v0/app/:slug?hub=
pub async fn create(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let slug = app_slug(&ctx)?;
    let params = FormParams::from_request(req).await?;

    let hub = owned_hub(store.as_ref(), params.require("hub")?, user_id).await?;
    let app = store.insert_app(&slug, hub.id).await?;

    info!("User {} registered app {} on hub {}", user_id, app.slug, hub.slug);
    Ok(ApiResponse::created(app).into_response())
}

/// GET /api/v0/app?hub=
pub async fn list(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let params = FormParams::from_query(&req);

    let hub = owned_hub(store.as_ref(), params.require("hub")?, user_id).await?;
    let app = store.app_slugs_for_hub(hub.id).await?;
    Ok(ApiResponse::ok(AppList { app }).into_response())
}

/// DELETE /api/v0/app/:slug?hub=
pub async fn delete(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let slug = app_slug(&ctx)?;
    let params = FormParams::from_request(req).await?;

    let hub = owned_hub(store.as_ref(), params.require("hub")?, user_id).await?;
    let app = store
        .delete_app(&slug, hub.id)
        .await
        .map_err(HandlerError::not_found)?;

    info!("User {} deleted app {} from hub {}", user_id, app.slug, hub.slug);
    Ok(ApiResponse::ok(app).into_response())
}
