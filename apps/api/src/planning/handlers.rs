//! Axum route handlers for the Planning API.

use std::str::FromStr;

use anyhow::anyhow;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::backend::PlanTarget;
use crate::models::graph::SkillNodeRow;
use crate::models::profile::{ProfileRow, Seniority};
use crate::models::user::get_user;
use crate::planning::generator::get_or_generate;
use crate::profiles;
use crate::quota::{self, SKILL_GRAPH_ESTIMATED_TOKENS};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub user_id: Uuid,
    pub role: String,
    pub company: String,
    pub seniority: String,
    pub major: Option<String>,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub graph_id: Uuid,
    pub profile: ProfileRow,
    /// True when the graph was served from the cache without a model call.
    pub cached: bool,
    /// Actual tokens spent producing this response (0 on a cache hit).
    pub tokens_consumed: i64,
    pub created_at: DateTime<Utc>,
    pub nodes: Vec<SkillNodeRow>,
}

/// POST /api/v1/plans
///
/// Quota check (blocking) → profile resolution → cached-or-generated skill
/// graph. The quota check uses the fixed pre-call estimate; the ledger is
/// charged with the actual count inside the generation path.
pub async fn handle_create_plan(
    State(state): State<AppState>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let role = req.role.trim();
    let company = req.company.trim();
    if role.is_empty() {
        return Err(AppError::Validation("role must not be empty".to_string()));
    }
    if company.is_empty() {
        return Err(AppError::Validation("company must not be empty".to_string()));
    }
    let seniority = Seniority::from_str(&req.seniority).map_err(AppError::Validation)?;
    let major = req
        .major
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let user = get_user(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", req.user_id)))?;

    let check = quota::check_limit(&state.db, &user, SKILL_GRAPH_ESTIMATED_TOKENS).await?;
    if !check.allowed {
        return Err(AppError::QuotaExceeded {
            limit: check.limit,
            current: check.current,
            remaining: check.remaining,
        });
    }

    let profile_id = profiles::resolve(&state.db, role, company, seniority, major).await?;
    let profile = profiles::get_profile(&state.db, profile_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow!("profile {profile_id} vanished after resolve")))?;

    let target = PlanTarget {
        role: role.to_string(),
        company: company.to_string(),
        seniority,
        major: major.map(str::to_string),
    };

    let (artifacts, cached) = get_or_generate(
        &state.db,
        state.backend.clone(),
        &state.flights,
        user.id,
        profile_id,
        target,
        req.force_regenerate,
    )
    .await?;

    Ok(Json(PlanResponse {
        graph_id: artifacts.graph.id,
        profile,
        cached,
        tokens_consumed: artifacts.tokens_consumed,
        created_at: artifacts.graph.created_at,
        nodes: artifacts.nodes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_request_deserialization_defaults_force_to_false() {
        let json = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "role": "Software Engineer",
            "company": "Acme",
            "seniority": "mid",
            "major": null
        });
        let req: PlanRequest = serde_json::from_value(json).unwrap();
        assert!(!req.force_regenerate);
        assert!(req.major.is_none());
    }

    #[test]
    fn test_plan_request_accepts_force_regenerate() {
        let json = serde_json::json!({
            "user_id": Uuid::new_v4(),
            "role": "SRE",
            "company": "Initech",
            "seniority": "senior",
            "force_regenerate": true
        });
        let req: PlanRequest = serde_json::from_value(json).unwrap();
        assert!(req.force_regenerate);
    }
}
