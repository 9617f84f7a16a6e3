// handlers/public/health.rs - GET /health and GET /

use axum::extract::Request;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::error::ApiError;
use crate::handlers::Outcome;
use crate::middleware::ApiResponse;
use crate::router::Context;

pub async fn health(_req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;

    if let Err(err) = store.ping().await {
        error!("Health check failed: {}", err);
        return Err(ApiError::service_unavailable("database_error", "database is not reachable").into());
    }

    Ok(ApiResponse::ok(json!({
        "status": "ok",
        "database": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

pub async fn root(_req: Request, _ctx: Context) -> Outcome {
    Ok(ApiResponse::ok(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "public": ["POST /signup", "POST /oauth/token", "GET /health"],
            "user": ["DELETE /api/v0/user/token"],
            "hub": [
                "POST /api/v0/hub?slug=",
                "GET /api/v0/hub",
                "DELETE /api/v0/hub?slug=",
                "POST /api/v0/send/:topic?hub=",
                "POST /api/v0/hub/:slug/send/:topic",
                "GET /api/v0/received/:topic/last",
            ],
            "app": [
                "POST /api/v0/app/:slug?hub=",
                "GET /api/v0/app?hub=",
                "DELETE /api/v0/app/:slug?hub=",
            ],
        },
    }))
    .into_response())
}
