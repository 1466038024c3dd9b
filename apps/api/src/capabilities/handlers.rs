use axum::{extract::State, Json};

use crate::capabilities::ToolSchema;
use crate::state::AppState;

/// GET /api/v1/capabilities
/// The tool schemas advertised to the model, for inspection by clients.
pub async fn handle_list_capabilities(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.capabilities.to_tool_schemas())
}
