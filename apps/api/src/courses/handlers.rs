use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::courses::scan_courses;
use crate::errors::AppError;
use crate::models::graph::CourseRecommendation;
use crate::models::user::get_user;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub user_id: Uuid,
    /// Optional display-name override; defaults to the stored node name.
    pub skill_name: Option<String>,
    /// Optional school override; defaults to the user's school.
    pub school: Option<String>,
    #[serde(default)]
    pub force_rescan: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub skill_id: Uuid,
    pub courses: Vec<CourseRecommendation>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/v1/skills/:skill_id/courses/scan
pub async fn handle_scan_courses(
    State(state): State<AppState>,
    Path(skill_id): Path<Uuid>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    let user = get_user(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.user_id)))?;

    let outcome = scan_courses(
        &state.db,
        state.backend.clone(),
        &user,
        skill_id,
        req.skill_name.as_deref(),
        req.school.as_deref(),
        req.force_rescan,
    )
    .await?;

    Ok(Json(ScanResponse {
        skill_id,
        courses: outcome.courses,
        cached: outcome.cached,
        message: outcome.message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_request_deserialization_defaults() {
        let json = serde_json::json!({ "user_id": Uuid::new_v4() });
        let req: ScanRequest = serde_json::from_value(json).unwrap();
        assert!(!req.force_rescan);
        assert!(req.school.is_none());
        assert!(req.skill_name.is_none());
    }
}
