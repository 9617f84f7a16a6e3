use std::sync::Arc;

use axum::extract::Request;

use crate::auth::AuthSettings;
use crate::broker::Broker;
use crate::database::Store;
use crate::router::{Context, Handler, Next};

/// Process-wide services shared by every request
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub broker: Arc<dyn Broker>,
    pub auth: Arc<AuthSettings>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, broker: Arc<dyn Broker>, auth: AuthSettings) -> Self {
        Self {
            store,
            broker,
            auth: Arc::new(auth),
        }
    }
}

/// Default handler that puts the shared services into each request's context
pub fn inject_services(services: Services) -> impl Handler {
    move |req: Request, mut ctx: Context, next: Next| {
        let services = services.clone();
        async move {
            ctx.meta.store = Some(services.store);
            ctx.meta.broker = Some(services.broker);
            ctx.meta.auth = Some(services.auth);
            next.run(req, ctx).await
        }
    }
}
