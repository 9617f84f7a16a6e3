// handlers/protected/message.rs - hub messaging handlers
//
//   POST /api/v0/send/:topic?hub=<slug>
//   POST /api/v0/hub/:slug/send/:topic
//   GET  /api/v0/received/:topic/last

use axum::extract::Request;
use axum::response::IntoResponse;
use tracing::info;

use super::owned_hub;
use crate::broker::Message;
use crate::database::models::NewSentMessage;
use crate::error::ApiError;
use crate::handlers::{has_content_type, FormParams, HandlerError, Outcome};
use crate::middleware::ApiResponse;
use crate::router::Context;

/// Largest message body accepted for publishing
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Publish a JSON message to one of the caller's hubs and record it
pub async fn send(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let broker = ctx.meta.broker()?;
    let user_id = ctx.meta.user_id()?;

    if !has_content_type(&req, "application/json") {
        return Err(ApiError::unsupported_media_type("invalid_message", "message must be encoded as JSON").into());
    }

    let topic = ctx
        .params
        .get("topic")
        .ok_or_else(|| ApiError::missing_param("topic"))?;

    // The hub comes from the path when present, else from `?hub=`
    let slug = match ctx.params.get("slug") {
        Some(slug) => slug.to_string(),
        None => FormParams::from_query(&req).require("hub")?.to_string(),
    };

    let body = axum::body::to_bytes(req.into_body(), MAX_MESSAGE_BYTES)
        .await
        .map_err(|_| ApiError::bad_request("invalid_message", "message body could not be read"))?;
    let mut message = Message::decode(&body)
        .map_err(|e| ApiError::unprocessable_entity("message_decode_failed", e.to_string()))?;
    message.meta.insert("topic".to_string(), topic.to_string());

    let hub = owned_hub(store.as_ref(), &slug, user_id).await?;
    broker.publish(&message, &hub.slug).await?;

    let sent = store
        .insert_sent_message(NewSentMessage {
            topic: topic.to_string(),
            message: message.encode().map_err(anyhow::Error::from)?,
            hub_id: hub.id,
            user_id,
        })
        .await?;

    info!("User {} sent message {} to hub {} on {}", user_id, sent.id, hub.slug, topic);
    Ok(ApiResponse::ok(sent).into_response())
}

/// Newest message received on `:topic` from any of the caller's hubs
pub async fn last_received(_req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let user_id = ctx.meta.user_id()?;
    let topic = ctx
        .params
        .get("topic")
        .ok_or_else(|| ApiError::missing_param("topic"))?;

    let message = store
        .last_received_message(topic, user_id)
        .await
        .map_err(HandlerError::not_found)?;
    Ok(ApiResponse::ok(message).into_response())
}
