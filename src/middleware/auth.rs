//! Bearer token gate for the versioned API.
//!
//! Each request moves through token parsing, the scope check and the
//! revocation lookup in that order and stops at the first failure. Only a
//! request that passes all three reaches the route's handlers, with its
//! [`Principal`] in the context.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    response::IntoResponse,
};
use tracing::{debug, warn};

use crate::auth::{AuthSettings, Claims};
use crate::database::{Store, StoreError};
use crate::error::ApiError;
use crate::router::{Context, HandlerResult, Next, Principal};

const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Why a request was turned away
#[derive(Debug)]
enum Rejection {
    NoToken,
    Undecodable(String),
    OutOfScope,
    NotValid,
    Store(StoreError),
}

impl Rejection {
    fn into_api_error(self) -> ApiError {
        match self {
            Rejection::NoToken => ApiError::unauthorized("invalid_token", "no token present in request"),
            Rejection::Undecodable(reason) => ApiError::unauthorized("invalid_token", reason),
            Rejection::OutOfScope => ApiError::forbidden("invalid_scope", "token is not valid for this scope"),
            Rejection::NotValid => ApiError::unauthorized("invalid_token", "token is not valid"),
            Rejection::Store(_) => ApiError::internal_server_error(),
        }
    }
}

/// Authenticate the request and record the caller in the context
pub async fn authenticate(req: Request, mut ctx: Context, next: Next) -> HandlerResult {
    let auth = Arc::clone(ctx.meta.auth()?);
    let store = Arc::clone(ctx.meta.store()?);

    // Nothing borrowed from the request may live across an await
    let token = bearer_token(&req);
    let path = req.uri().path().to_string();

    match verify(token, &path, &auth, store.as_ref()).await {
        Ok(principal) => {
            debug!("Authorized user {} with token {}", principal.user_id, principal.token_id);
            ctx.meta.principal = Some(principal);
            next.run(req, ctx).await
        }
        Err(Rejection::Store(err)) => Err(err.into()),
        Err(rejection) => {
            warn!("Rejected {} {}: {:?}", req.method(), path, rejection);
            Ok(rejection.into_api_error().into_response())
        }
    }
}

async fn verify(
    token: Option<String>,
    path: &str,
    auth: &AuthSettings,
    store: &dyn Store,
) -> Result<Principal, Rejection> {
    let raw = token.ok_or(Rejection::NoToken)?;
    let claims = auth
        .decode(&raw)
        .map_err(|e| Rejection::Undecodable(e.to_string()))?;

    check_scope(path, auth, &claims)?;

    let token = match store.token(claims.jti).await {
        Ok(token) => token,
        Err(StoreError::Data(_)) => return Err(Rejection::NotValid),
        Err(err) => return Err(Rejection::Store(err)),
    };
    if token.is_revoked() || token.user_id != claims.user_id {
        return Err(Rejection::NotValid);
    }

    Ok(Principal {
        user_id: token.user_id,
        token_id: token.id,
        scopes: claims.scopes,
    })
}

fn check_scope(path: &str, auth: &AuthSettings, claims: &Claims) -> Result<(), Rejection> {
    match auth.scope_map.required_scope(path) {
        Some(scope) if claims.has_scope(scope) => Ok(()),
        _ => Err(Rejection::OutOfScope),
    }
}

/// Token from `Authorization: Bearer <token>`, falling back to the
/// `access_token` query parameter
fn bearer_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        })
        .filter(|token| !token.is_empty());

    from_header.or_else(|| {
        let query = req.uri().query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == ACCESS_TOKEN_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|token| !token.is_empty())
    })
}
