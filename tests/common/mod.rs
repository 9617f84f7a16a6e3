#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

use ripple_cloud::auth::{AuthSettings, Claims};
use ripple_cloud::broker::{dispatcher, LocalBroker};
use ripple_cloud::database::{MemoryStore, Store};
use ripple_cloud::{app, AppConfig, Services};

pub const TOKEN_SECRET: &str = "test-secret";
pub const PASSWORD: &str = "password";

/// Full application on a free local port, backed by in-process store and broker
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub broker: Arc<LocalBroker>,
    pub auth: AuthSettings,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://unused/ripple"),
            ("TOKEN_SECRET", TOKEN_SECRET),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_vars(|name| vars.get(name).map(|v| v.to_string()))?;

        let store = Arc::new(MemoryStore::new());
        let broker = Arc::new(LocalBroker::new());
        let auth = AuthSettings::from_config(&config.security)?;
        dispatcher::start(store.clone(), broker.as_ref())?;

        let services = Services::new(store.clone(), broker.clone(), auth.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        let router = app(services, &config);
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let server = Self {
            port,
            base_url,
            store,
            broker,
            auth,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, username: &str) -> Result<Value> {
        let email = format!("{}@example.com", username);
        let resp = self
            .client
            .post(self.url("/signup"))
            .form(&[("username", username), ("email", email.as_str()), ("password", PASSWORD)])
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::CREATED, "signup failed: {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Password grant for `login`, returning the access token
    pub async fn login(&self, login: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/oauth/token"))
            .form(&[("grant_type", "password"), ("login", login), ("password", PASSWORD)])
            .send()
            .await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "login failed: {}", resp.status());
        let body: Value = resp.json().await?;
        body["access_token"]
            .as_str()
            .map(String::from)
            .context("no access_token in response")
    }

    /// Sign up `username` and log in
    pub async fn user(&self, username: &str) -> Result<(i64, String)> {
        let user = self.signup(username).await?;
        let id = user["id"].as_i64().context("user has no id")?;
        Ok((id, self.login(username).await?))
    }

    /// Token for `user_id` carrying exactly `scopes`
    pub async fn token_with_scopes(&self, user_id: i64, scopes: &[&str]) -> Result<String> {
        let record = self.store.insert_token(user_id, 3600).await?;
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
        Ok(self.auth.encode(&Claims::for_token(&record, &scopes))?)
    }

    pub async fn create_hub(&self, token: &str, slug: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/api/v0/hub"))
            .query(&[("slug", slug)])
            .bearer_auth(token)
            .send()
            .await?)
    }
}

/// Assert the standard error body and return it
pub async fn expect_error(resp: reqwest::Response, status: StatusCode, code: &str) -> Result<Value> {
    assert_eq!(resp.status(), status);
    let body: Value = resp.json().await?;
    assert_eq!(body["error"], code, "unexpected body {}", body);
    assert!(body["error_description"].is_string(), "missing description in {}", body);
    Ok(body)
}
