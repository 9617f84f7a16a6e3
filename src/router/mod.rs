// router/mod.rs - Handler chain router
//
// axum does the method/path matching; this module owns what happens after a
// match: a fresh Context is built for the request and an ordered chain of
// handlers (defaults first, then the route's own) runs over it. Each handler
// decides whether the chain continues by calling `next.run(req, ctx)`.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path as FsPath;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, Request},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
};
use tower_http::services::ServeDir;

use crate::error::ApiError;

pub mod context;

pub use context::{Context, Meta, Params, Principal};

/// What every handler in a chain returns.
///
/// `Ok` carries the response for the client, whether the handler produced it
/// or got it back from `next`. `Err` aborts the chain and is answered with a
/// generic 500.
pub type HandlerResult = anyhow::Result<Response>;

/// One link of a handler chain
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Request, ctx: Context, next: Next) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request, Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, req: Request, ctx: Context, next: Next) -> HandlerResult {
        (self)(req, ctx, next).await
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

pub fn boxed<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

/// Build a handler list: `chain![authenticate, hub::add_hub]`
#[macro_export]
macro_rules! chain {
    ($($handler:expr),* $(,)?) => {
        vec![$($crate::router::boxed($handler)),*]
    };
}

/// Continuation handed to each handler: the rest of the chain
#[derive(Clone)]
pub struct Next {
    chain: Arc<[BoxedHandler]>,
    position: usize,
}

impl Next {
    fn start(chain: Arc<[BoxedHandler]>) -> Self {
        Self { chain, position: 0 }
    }

    /// Number of handlers still to run
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.position)
    }

    /// Run the next handler. Past the end of the chain this is a no-op that
    /// answers an empty 200.
    pub async fn run(self, req: Request, ctx: Context) -> HandlerResult {
        let Some(handler) = self.chain.get(self.position).cloned() else {
            return Ok(().into_response());
        };

        let next = Next {
            chain: self.chain,
            position: self.position + 1,
        };
        handler.call(req, ctx, next).await
    }
}

/// Router with per-route handler chains and a global default list
pub struct Router {
    inner: axum::Router,
    defaults: Vec<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            inner: axum::Router::new(),
            defaults: Vec::new(),
        }
    }

    /// Set the handlers prepended to every route registered after this call
    pub fn defaults(&mut self, handlers: Vec<BoxedHandler>) {
        self.defaults = handlers;
    }

    /// Register `handlers` for `method` on `path` (`:name` and `*name` segments allowed)
    pub fn handle(&mut self, method: MethodFilter, path: &str, handlers: Vec<BoxedHandler>) {
        let chain: Arc<[BoxedHandler]> = self.defaults.iter().cloned().chain(handlers).collect();
        tracing::debug!("Registered {:?} {} with {} handlers", method, path, chain.len());

        let endpoint = move |params: Option<Path<HashMap<String, String>>>, req: Request| {
            let chain = Arc::clone(&chain);
            async move {
                let params = params.map(|Path(params)| Params::new(params)).unwrap_or_default();
                dispatch(chain, req, Context::new(params)).await
            }
        };

        self.inner = std::mem::take(&mut self.inner).route(path, on(method, endpoint));
    }

    pub fn get(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::GET, path, handlers)
    }

    pub fn head(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::HEAD, path, handlers)
    }

    pub fn post(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::POST, path, handlers)
    }

    pub fn put(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::PUT, path, handlers)
    }

    pub fn patch(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::PATCH, path, handlers)
    }

    pub fn delete(&mut self, path: &str, handlers: Vec<BoxedHandler>) {
        self.handle(MethodFilter::DELETE, path, handlers)
    }

    /// Serve a directory under `prefix`. These requests never enter a chain.
    pub fn serve_files(&mut self, prefix: &str, dir: impl AsRef<FsPath>) {
        let service = ServeDir::new(dir.as_ref());
        self.inner = std::mem::take(&mut self.inner).nest_service(prefix, service);
    }

    /// Finish registration and hand the routes to axum
    pub fn into_axum(self) -> axum::Router {
        self.inner.fallback(|| async {
            ApiError::not_found("not_found", "no route matches the request path")
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(chain: Arc<[BoxedHandler]>, req: Request, ctx: Context) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match Next::start(chain).run(req, ctx).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!("{} {} failed: {:#}", method, path, err);
            ApiError::internal_server_error().into_response()
        }
    }
}
