// handlers/mod.rs - Route handlers
//
// Public handlers need no token (/signup, /oauth/token, /health). Protected
// handlers sit behind the auth gate under /api/v0 and read the caller from
// the context.

use std::collections::HashMap;
use std::future::Future;

use axum::{
    extract::Request,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};

use crate::auth::password::PasswordError;
use crate::auth::TokenError;
use crate::broker::BrokerError;
use crate::database::StoreError;
use crate::error::ApiError;
use crate::router::{Context, Handler, Next};

pub mod protected;
pub mod public;

/// Largest urlencoded body read into parameters
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Failure of an endpoint: either an answer for the client or an internal error
#[derive(Debug)]
pub enum HandlerError {
    Client(ApiError),
    Internal(anyhow::Error),
}

impl HandlerError {
    /// Data errors become a 404 instead of the usual 400
    pub fn not_found(err: StoreError) -> Self {
        match err {
            StoreError::Data(data) => HandlerError::Client(ApiError::not_found(data.code, data.desc)),
            other => other.into(),
        }
    }
}

impl From<ApiError> for HandlerError {
    fn from(err: ApiError) -> Self {
        HandlerError::Client(err)
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(err: anyhow::Error) -> Self {
        HandlerError::Internal(err)
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Data(data) => HandlerError::Client(data.into()),
            other => HandlerError::Internal(other.into()),
        }
    }
}

impl From<BrokerError> for HandlerError {
    fn from(err: BrokerError) -> Self {
        HandlerError::Internal(err.into())
    }
}

impl From<TokenError> for HandlerError {
    fn from(err: TokenError) -> Self {
        HandlerError::Internal(err.into())
    }
}

impl From<PasswordError> for HandlerError {
    fn from(err: PasswordError) -> Self {
        HandlerError::Internal(err.into())
    }
}

pub type Outcome = Result<Response, HandlerError>;

/// Turn an endpoint into the last link of a chain. Client errors are answered
/// directly; internal errors abort the chain and become a 500.
pub fn endpoint<F, Fut>(f: F) -> impl Handler
where
    F: Fn(Request, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    move |req: Request, ctx: Context, _next: Next| {
        let outcome = f(req, ctx);
        async move {
            match outcome.await {
                Ok(response) => Ok(response),
                Err(HandlerError::Client(err)) => Ok(err.into_response()),
                Err(HandlerError::Internal(err)) => Err(err),
            }
        }
    }
}

/// Whether the request's media type is `mime`, ignoring case and parameters
pub fn has_content_type(req: &Request, mime: &str) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().eq_ignore_ascii_case(mime))
        .unwrap_or(false)
}

/// Named request parameters from the query string and an urlencoded body.
/// Body values win over query values of the same name.
#[derive(Debug, Clone, Default)]
pub struct FormParams(HashMap<String, String>);

impl FormParams {
    /// Query string only; the body is left alone
    pub fn from_query(req: &Request) -> Self {
        let mut params = Self::default();
        if let Some(query) = req.uri().query() {
            params.extend(query.as_bytes());
        }
        params
    }

    /// Query string plus the body when it is `application/x-www-form-urlencoded`
    pub async fn from_request(req: Request) -> Result<Self, HandlerError> {
        let mut params = Self::from_query(&req);
        if has_content_type(&req, "application/x-www-form-urlencoded") {
            let body = axum::body::to_bytes(req.into_body(), MAX_FORM_BYTES)
                .await
                .map_err(|_| ApiError::bad_request("invalid_request", "request body could not be read"))?;
            params.extend(&body);
        }
        Ok(params)
    }

    fn extend(&mut self, encoded: &[u8]) {
        self.0.extend(
            url::form_urlencoded::parse(encoded).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    /// Non-empty value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Value of `name`, or the `<name>_required` client error
    pub fn require(&self, name: &str) -> Result<&str, ApiError> {
        self.get(name).ok_or_else(|| ApiError::missing_param(name))
    }
}
