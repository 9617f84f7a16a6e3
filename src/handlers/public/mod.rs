// handlers/public/mod.rs - Handlers reachable without a token

pub mod health;
pub mod signup;
pub mod token;
