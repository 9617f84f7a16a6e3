pub mod app;
pub mod auth;
pub mod broker;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use app::app;
pub use config::AppConfig;
pub use middleware::Services;
