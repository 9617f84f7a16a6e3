// handlers/protected/mod.rs - Handlers behind the auth gate (/api/v0/*)
//
// Every handler here runs after `authenticate`, so the context carries the
// caller's principal.

use crate::database::models::Hub;
use crate::database::{DataError, Store};
use crate::error::ApiError;
use crate::handlers::HandlerError;

pub mod app;
pub mod hub;
pub mod message;
pub mod token;

/// The hub with `slug` if `user_id` owns it. Hubs of other users read as
/// missing so their existence is not revealed.
pub(crate) async fn owned_hub(store: &dyn Store, slug: &str, user_id: i64) -> Result<Hub, HandlerError> {
    let hub = store.hub_by_slug(slug).await?;
    if hub.user_id != user_id {
        return Err(ApiError::from(DataError::not_found("hub not found")).into());
    }
    Ok(hub)
}
