use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::app::app;
use crate::auth::AuthSettings;
use crate::broker::{dispatcher, Broker, LocalBroker, MqttBroker};
use crate::config::AppConfig;
use crate::database::PgStore;
use crate::middleware::Services;

#[derive(Parser)]
#[command(name = "ripple-cloud")]
#[command(about = "Ripple cloud API server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Apply database migrations and exit")]
    Migrate,
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Migrate => {
            let store = PgStore::connect(&config.database).await?;
            store.migrate().await?;
            Ok(())
        }
    }
}

async fn serve(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    info!("Starting ripple-cloud in {:?} mode", config.environment);

    let store = PgStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    if config.database.run_migrations {
        store.migrate().await?;
    }
    let store = Arc::new(store);

    // Messages from hubs arrive through the broker and are stored by the dispatcher
    let broker: Arc<dyn Broker> = match &config.broker.url {
        Some(_) => {
            let (broker, _connection) = MqttBroker::connect(&config.broker)?;
            Arc::new(broker)
        }
        None => {
            warn!("BROKER_URL not set, hub messages stay inside this process");
            Arc::new(LocalBroker::new())
        }
    };
    dispatcher::start(store.clone(), broker.as_ref())?;

    let auth = AuthSettings::from_config(&config.security)?;
    let services = Services::new(store, broker, auth);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("ripple-cloud listening on http://{}", bind_addr);

    axum::serve(listener, app(services, &config)).await?;
    Ok(())
}
