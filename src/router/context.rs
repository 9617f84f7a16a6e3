use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use crate::auth::AuthSettings;
use crate::broker::Broker;
use crate::database::Store;

/// Path parameters captured by the matched route (`:name` and `*name` segments)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    /// Value of a named parameter, `None` when absent or empty
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The authenticated caller, written by the auth gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub token_id: i64,
    pub scopes: Vec<String>,
}

/// Request-scoped data shared between the handlers of one chain.
///
/// Every slot starts empty; default handlers fill in the shared services and
/// the auth gate fills in the principal. Accessors fail with an error (which
/// the router turns into a 500) when a slot was never filled, since that can
/// only be a wiring mistake.
#[derive(Clone, Default)]
pub struct Meta {
    pub store: Option<Arc<dyn Store>>,
    pub broker: Option<Arc<dyn Broker>>,
    pub auth: Option<Arc<AuthSettings>>,
    pub principal: Option<Principal>,
}

impl Meta {
    pub fn store(&self) -> anyhow::Result<&Arc<dyn Store>> {
        self.store.as_ref().ok_or_else(|| anyhow!("store not set in context"))
    }

    pub fn broker(&self) -> anyhow::Result<&Arc<dyn Broker>> {
        self.broker.as_ref().ok_or_else(|| anyhow!("broker not set in context"))
    }

    pub fn auth(&self) -> anyhow::Result<&Arc<AuthSettings>> {
        self.auth.as_ref().ok_or_else(|| anyhow!("auth settings not set in context"))
    }

    pub fn principal(&self) -> anyhow::Result<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| anyhow!("principal not set in context, is the route authenticated?"))
    }

    /// Shortcut for the authenticated user's ID
    pub fn user_id(&self) -> anyhow::Result<i64> {
        self.principal().map(|principal| principal.user_id)
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta")
            .field("store", &self.store.is_some())
            .field("broker", &self.broker.is_some())
            .field("auth", &self.auth.is_some())
            .field("principal", &self.principal)
            .finish()
    }
}

/// Fresh per request; moved from handler to handler along the chain
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub params: Params,
    pub meta: Meta,
}

impl Context {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            meta: Meta::default(),
        }
    }
}
