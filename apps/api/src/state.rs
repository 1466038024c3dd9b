use std::sync::Arc;

use sqlx::PgPool;

use crate::capabilities::CapabilityRegistry;
use crate::llm_client::backend::GenerativeBackend;
use crate::planning::generator::PlanFlights;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Pluggable generative backend. Production: `LlmBackend`; tests swap in mocks.
    pub backend: Arc<dyn GenerativeBackend>,
    /// Single-flight table for skill graph generation, one entry per
    /// profile id while a generation is in flight.
    pub flights: PlanFlights,
    /// Built once at startup from the built-in set; read-only afterwards.
    pub capabilities: Arc<CapabilityRegistry>,
}
