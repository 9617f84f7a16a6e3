pub mod auth;
pub mod response;
pub mod services;

pub use auth::authenticate;
pub use response::ApiResponse;
pub use services::{inject_services, Services};
