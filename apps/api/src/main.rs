mod capabilities;
mod config;
mod courses;
mod db;
mod errors;
mod llm_client;
mod models;
mod planning;
mod profiles;
mod quota;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::capabilities::builtin::default_registry;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::backend::LlmBackend;
use crate::llm_client::LlmClient;
use crate::planning::generator::PlanFlights;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Compass API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client and the generative backend over it
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    let backend = Arc::new(LlmBackend::new(llm));
    info!("LLM backend initialized (model: {})", llm_client::MODEL);

    // Register built-in agent capabilities before the first request
    let capabilities = Arc::new(default_registry());
    info!("Capability registry loaded: {} tools", capabilities.len());

    // Build app state
    let state = AppState {
        db,
        backend,
        flights: PlanFlights::new(),
        capabilities,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
