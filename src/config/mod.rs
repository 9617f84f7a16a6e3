use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::auth::ScopeMap;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_BROKER_CLIENT_ID: &str = "ripple-cloud";
const DEFAULT_BROKER_KEEP_ALIVE_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub broker: BrokerConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// `mqtt://[user:password@]host[:port]`; without it hub messages stay in-process
    pub url: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub token_secret: String,
    pub token_lifetime_secs: i64,
    pub token_scopes: Vec<String>,
    pub scope_map: ScopeMap,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("token_secret", &"<redacted>")
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("token_scopes", &self.token_scopes)
            .field("scope_map", &self.scope_map)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl AppConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source. Presets are chosen by
    /// `APP_ENV`, then individual variables override them.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match var("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let database_url = var("DATABASE_URL")
            .or_else(|| var("DB_URL"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let token_secret = var("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?;

        let mut config = Self::preset(environment, database_url, token_secret);

        // Server overrides
        if let Some(v) = var("PORT").or_else(|| var("RIPPLE_PORT")) {
            config.server.port = parse("PORT", &v)?;
        }
        if let Some(v) = var("STATIC_DIR") {
            config.server.static_dir = Some(PathBuf::from(v));
        }

        // Database overrides
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = var("DATABASE_CONNECTION_TIMEOUT") {
            config.database.connection_timeout = parse("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }
        if let Some(v) = var("DATABASE_RUN_MIGRATIONS") {
            config.database.run_migrations = parse("DATABASE_RUN_MIGRATIONS", &v)?;
        }

        // Broker overrides
        if let Some(v) = var("BROKER_URL") {
            config.broker.url = Some(v);
        }
        if let Some(v) = var("BROKER_CLIENT_ID") {
            config.broker.client_id = v;
        }
        if let Some(v) = var("BROKER_KEEP_ALIVE_SECS") {
            config.broker.keep_alive_secs = parse("BROKER_KEEP_ALIVE_SECS", &v)?;
        }
        if config.broker.url.is_none() && environment != Environment::Development {
            return Err(ConfigError::Missing("BROKER_URL"));
        }

        // Security overrides
        if let Some(v) = var("TOKEN_LIFETIME_SECS") {
            let secs: i64 = parse("TOKEN_LIFETIME_SECS", &v)?;
            if secs <= 0 {
                return Err(ConfigError::Invalid { name: "TOKEN_LIFETIME_SECS", value: v });
            }
            config.security.token_lifetime_secs = secs;
        }
        if let Some(v) = var("TOKEN_SCOPES") {
            config.security.token_scopes = split_list(&v);
        }
        if let Some(v) = var("TOKEN_SCOPE_MAP") {
            config.security.scope_map = ScopeMap::parse(&v)
                .map_err(|_| ConfigError::Invalid { name: "TOKEN_SCOPE_MAP", value: v.clone() })?;
        }
        if let Some(v) = var("SECURITY_ENABLE_CORS") {
            config.security.enable_cors = parse("SECURITY_ENABLE_CORS", &v)?;
        }
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            config.security.cors_origins = split_list(&v);
        }

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    fn preset(environment: Environment, database_url: String, token_secret: String) -> Self {
        let (max_connections, connection_timeout, cors_origins) = match environment {
            Environment::Development => (10, 30, vec![]),
            Environment::Staging => (20, 10, vec!["https://staging.ripple.example".to_string()]),
            Environment::Production => (50, 5, vec!["https://ripple.example".to_string()]),
        };

        Self {
            environment,
            server: ServerConfig {
                port: DEFAULT_PORT,
                static_dir: None,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                connection_timeout,
                run_migrations: environment == Environment::Development,
            },
            broker: BrokerConfig {
                url: None,
                client_id: DEFAULT_BROKER_CLIENT_ID.to_string(),
                keep_alive_secs: DEFAULT_BROKER_KEEP_ALIVE_SECS,
            },
            security: SecurityConfig {
                token_secret,
                token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
                token_scopes: vec!["user".to_string(), "hub".to_string(), "app".to_string()],
                scope_map: ScopeMap::default(),
                enable_cors: true,
                cors_origins,
            },
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
