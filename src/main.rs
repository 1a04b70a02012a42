//! event-registration server entry point.
//!
//! Loads configuration, picks the store backend and serves the REST and
//! WebSocket endpoints until Ctrl-C.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use event_registration::app_state::AppState;
use event_registration::config::{ServiceConfig, LogFormat};
use event_registration::domain::EventBus;
use event_registration::server;
use event_registration::store::{MemoryStore, PostgresStore, RegistrationStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);
    tracing::info!(
        addr = %config.listen_addr,
        persistence = config.persistence_enabled,
        "starting event-registration"
    );

    if config.persistence_enabled {
        let store = PostgresStore::connect(&config)
            .await
            .context("failed to connect to PostgreSQL")?;
        if config.database_run_migrations {
            store.migrate().await.context("failed to apply migrations")?;
            tracing::info!("database migrations applied");
        }
        run(config, store).await
    } else {
        tracing::warn!("persistence disabled, using the in-memory store");
        run(config, MemoryStore::new()).await
    }
}

async fn run<S: RegistrationStore>(config: ServiceConfig, store: S) -> anyhow::Result<()> {
    let event_bus = EventBus::new(config.event_bus_capacity);
    let app = server::build_app(AppState::new(store, event_bus), &config);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    server::serve(listener, app).await.context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}
