use std::collections::HashMap;

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::models::Token;

pub mod password;

/// Matches versioned API paths, capturing the first segment: /api/v0/hub/list -> "hub"
static API_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/v\d+/([^/]+)").expect("static regex is valid"));

/// Claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued at
    pub iat: i64,
    /// Expires at
    pub exp: i64,
    /// Token record ID
    pub jti: i64,
    pub user_id: i64,
    pub scopes: Vec<String>,
}

impl Claims {
    /// Claims for a freshly stored token record. The token is valid from its
    /// creation for `expires_in` seconds.
    pub fn for_token(token: &Token, scopes: &[String]) -> Self {
        let iat = token.created_at.timestamp();
        Self {
            iat,
            exp: iat + token.expires_in,
            jti: token.id,
            user_id: token.user_id,
            scopes: scopes.to_vec(),
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token secret is not configured")]
    InvalidSecret,

    #[error("failed to encode token: {0}")]
    Encode(jsonwebtoken::errors::Error),

    // Surfaced to clients as the invalid_token description
    #[error("{0}")]
    Decode(jsonwebtoken::errors::Error),
}

/// Maps the first segment of a versioned API path to the scope a token needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeMap(HashMap<String, String>);

impl ScopeMap {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Parse `segment=scope` pairs separated by commas, e.g. `hub=hub,send=hub`
    pub fn parse(pairs: &str) -> Result<Self, String> {
        let mut map = HashMap::new();
        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((segment, scope)) if !segment.trim().is_empty() && !scope.trim().is_empty() => {
                    map.insert(segment.trim().to_string(), scope.trim().to_string());
                }
                _ => return Err(format!("invalid scope mapping '{}', expected segment=scope", pair)),
            }
        }
        Ok(Self(map))
    }

    /// First segment after `/api/vN/`, if the path is a versioned API path
    pub fn api_segment(path: &str) -> Option<&str> {
        API_PATH
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Scope required for `path`. Segments without a mapping require a scope
    /// of the same name; paths outside the versioned API require nothing a
    /// token can carry, so `None`.
    pub fn required_scope<'a>(&'a self, path: &'a str) -> Option<&'a str> {
        let segment = Self::api_segment(path)?;
        Some(self.0.get(segment).map(String::as_str).unwrap_or(segment))
    }
}

impl Default for ScopeMap {
    fn default() -> Self {
        Self::new([
            ("user", "user"),
            ("hub", "hub"),
            ("app", "app"),
            ("send", "hub"),
            ("received", "hub"),
        ])
    }
}

/// Everything the token endpoints and the auth gate need to mint and check tokens
#[derive(Clone)]
pub struct AuthSettings {
    secret: Vec<u8>,
    pub token_lifetime: Duration,
    pub scopes: Vec<String>,
    pub scope_map: ScopeMap,
}

impl AuthSettings {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        token_lifetime: Duration,
        scopes: Vec<String>,
        scope_map: ScopeMap,
    ) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        Ok(Self {
            secret,
            token_lifetime,
            scopes,
            scope_map,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, TokenError> {
        Self::new(
            security.token_secret.as_bytes(),
            Duration::seconds(security.token_lifetime_secs),
            security.token_scopes.clone(),
            security.scope_map.clone(),
        )
    }

    /// Sign claims as an HS256 JWT
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(TokenError::Encode)
    }

    /// Verify signature and expiry, then return the claims
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(TokenError::Decode)
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("secret", &"<redacted>")
            .field("token_lifetime", &self.token_lifetime)
            .field("scopes", &self.scopes)
            .field("scope_map", &self.scope_map)
            .finish()
    }
}
