pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::capabilities::handlers as capability_handlers;
use crate::courses::handlers as course_handlers;
use crate::planning::handlers as planning_handlers;
use crate::quota::handlers as quota_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Planning API
        .route("/api/v1/plans", post(planning_handlers::handle_create_plan))
        // Course recommendations
        .route(
            "/api/v1/skills/:skill_id/courses/scan",
            post(course_handlers::handle_scan_courses),
        )
        // Quota
        .route("/api/v1/usage", get(quota_handlers::handle_get_usage))
        // Agent tooling
        .route(
            "/api/v1/capabilities",
            get(capability_handlers::handle_list_capabilities),
        )
        .with_state(state)
}
