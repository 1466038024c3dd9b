use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::get_user;
use crate::quota::{get_usage, UsageSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/usage
pub async fn handle_get_usage(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<UsageSummary>, AppError> {
    let user = get_user(&state.db, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", params.user_id)))?;

    Ok(Json(get_usage(&state.db, &user).await?))
}
