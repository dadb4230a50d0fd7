//! poolshield-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use poolshield_gateway::api;
use poolshield_gateway::app_state::AppState;
use poolshield_gateway::auth::TokenVerifier;
use poolshield_gateway::config::GatewayConfig;
use poolshield_gateway::domain::{CityCatalog, EventBus, PoolRegistry};
use poolshield_gateway::persistence::{self, PostgresPersistence};
use poolshield_gateway::service::{PoolService, ServiceSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    init_tracing(config.log_json);
    tracing::info!(addr = %config.listen_addr, "starting poolshield-gateway");

    let catalog = match &config.city_catalog_path {
        Some(path) => CityCatalog::load(path)
            .with_context(|| format!("loading city catalog from {}", path.display()))?,
        None => CityCatalog::builtin(),
    };
    tracing::info!(cities = catalog.len(), "city catalog loaded");

    // Build domain layer
    let registry = Arc::new(PoolRegistry::new(
        Arc::new(catalog),
        config.membership_limits(),
    ));

    let event_bus = if config.persistence_enabled {
        let store = PostgresPersistence::connect(&config).await?;
        store.migrate().await?;
        persistence::restore_registry(&store, &registry).await?;
        let (bus, journal) = EventBus::with_journal(config.event_bus_capacity);
        let _writer = persistence::spawn_event_log_writer(store, journal);
        bus
    } else {
        tracing::warn!("persistence disabled, state lives in memory only");
        EventBus::new(config.event_bus_capacity)
    };

    // Build service layer
    let pool_service = Arc::new(PoolService::new(
        registry,
        event_bus,
        ServiceSettings {
            default_block_duration_days: config.default_block_duration_days,
            top_cities_limit: config.top_cities_limit,
        },
    ));
    let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));
    let app = api::build_app(AppState::new(pool_service, verifier), config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
