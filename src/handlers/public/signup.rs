// handlers/public/signup.rs - POST /signup handler

use axum::extract::Request;
use axum::response::IntoResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::auth::password::hash_password;
use crate::database::models::NewUser;
use crate::error::ApiError;
use crate::handlers::{FormParams, Outcome};
use crate::middleware::ApiResponse;
use crate::router::Context;

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex is valid"));

/// Create a user from `username`, `email` and `password`.
///
/// Answers 201 with the new user record (without the password hash), or 400
/// with `<field>_required`, `invalid_email` or `unique_violation`.
pub async fn create(req: Request, ctx: Context) -> Outcome {
    let store = ctx.meta.store()?;
    let params = FormParams::from_request(req).await?;

    let username = params.require("username")?;
    let email = params.require("email")?;
    let password = params.require("password")?;

    if !EMAIL.is_match(email) {
        return Err(ApiError::bad_request("invalid_email", "email is not valid").into());
    }

    let user = store
        .insert_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            encrypted_password: hash_password(password)?,
        })
        .await?;

    info!("Signed up user {} ({})", user.id, user.username);
    Ok(ApiResponse::created(user).into_response())
}
