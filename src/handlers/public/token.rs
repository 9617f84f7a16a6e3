// handlers/public/token.rs - POST /oauth/token handler (password grant)

use axum::extract::Request;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::password::verify_password;
use crate::auth::Claims;
use crate::error::ApiError;
use crate::handlers::{FormParams, HandlerError, Outcome};
use crate::middleware::ApiResponse;
use crate::router::Context;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Exchange `login` (username or email) and `password` for a bearer token
pub async fn create(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let auth = ctx.meta.auth()?;
    let params = FormParams::from_request(req).await?;

    let grant_type = params.require("grant_type")?;
    let login = params.require("login")?;
    let password = params.require("password")?;

    if grant_type != "password" {
        return Err(ApiError::bad_request("unsupported_grant_type", "grant_type must be password").into());
    }

    let user = match store.user_by_login(login).await {
        Ok(user) => user,
        Err(err) if err.data().is_some() => {
            return Err(ApiError::bad_request("invalid_grant", "user not found").into());
        }
        Err(err) => return Err(HandlerError::from(err)),
    };

    if !verify_password(password, &user.encrypted_password)? {
        warn!("Failed login for user {}", user.id);
        return Err(ApiError::bad_request("invalid_grant", "failed to authenticate").into());
    }

    let expires_in = auth.token_lifetime.num_seconds();
    let token = store.insert_token(user.id, expires_in).await?;
    let access_token = auth.encode(&Claims::for_token(&token, &auth.scopes))?;

    info!("Issued token {} to user {}", token.id, user.id);
    Ok(ApiResponse::ok(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in,
    })
    .into_response())
}
