// app.rs - Route table and global layers

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chain;
use crate::config::{AppConfig, SecurityConfig};
use crate::handlers::{endpoint, protected, public};
use crate::middleware::{authenticate, inject_services, Services};
use crate::router::Router;

/// Build the full HTTP application over the given services
pub fn app(services: Services, config: &AppConfig) -> axum::Router {
    let mut router = Router::new();

    // Every route below gets the shared services in its context
    router.defaults(chain![inject_services(services)]);

    public_routes(&mut router);
    user_routes(&mut router);
    hub_routes(&mut router);
    app_routes(&mut router);
    message_routes(&mut router);

    if let Some(dir) = &config.server.static_dir {
        router.serve_files("/static", dir);
    }

    router
        .into_axum()
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn public_routes(router: &mut Router) {
    router.get("/", chain![endpoint(public::health::root)]);
    router.get("/health", chain![endpoint(public::health::health)]);
    router.post("/signup", chain![endpoint(public::signup::create)]);
    router.post("/oauth/token", chain![endpoint(public::token::create)]);
}

fn user_routes(router: &mut Router) {
    router.delete("/api/v0/user/token", chain![authenticate, endpoint(protected::token::revoke)]);
}

fn hub_routes(router: &mut Router) {
    use protected::hub;

    router.post("/api/v0/hub", chain![authenticate, endpoint(hub::create)]);
    router.get("/api/v0/hub", chain![authenticate, endpoint(hub::list)]);
    router.delete("/api/v0/hub", chain![authenticate, endpoint(hub::delete)]);
}

fn app_routes(router: &mut Router) {
    use protected::app;

    router.get("/api/v0/app", chain![authenticate, endpoint(app::list)]);
    router.post("/api/v0/app/:slug", chain![authenticate, endpoint(app::create)]);
    router.delete("/api/v0/app/:slug", chain![authenticate, endpoint(app::delete)]);
}

fn message_routes(router: &mut Router) {
    use protected::message;

    router.post("/api/v0/send/:topic", chain![authenticate, endpoint(message::send)]);
    router.post("/api/v0/hub/:slug/send/:topic", chain![authenticate, endpoint(message::send)]);
    router.get("/api/v0/received/:topic/last", chain![authenticate, endpoint(message::last_received)]);
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let security: &SecurityConfig = &config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if config.is_development() && security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
