//! Course Recommendation Cache — per-skill ranked course lists with a
//! 24-hour freshness window.
//!
//! The cache lives on the skill node row itself (`cached_courses` +
//! `courses_last_scanned_at`) and is keyed by skill id alone: course
//! relevance for a skill at a school is not user-specific, so every user
//! shares one entry. Refresh replaces the list wholesale, never merges.

pub mod handlers;

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::backend::GenerativeBackend;
use crate::models::graph::{CourseRecommendation, SkillNodeRow};
use crate::models::user::User;
use crate::quota::{self, COURSE_SCAN_ESTIMATED_TOKENS};

/// Freshness window for a cached course list.
pub const COURSE_CACHE_TTL_HOURS: i64 = 24;
/// Upper bound on courses requested from (and kept after) a scan.
pub const MAX_COURSE_RESULTS: usize = 10;

/// A cache entry is usable iff the caller is not forcing a rescan, the
/// entry is non-empty, and it was scanned within the TTL.
pub fn cache_is_fresh(
    last_scanned_at: Option<DateTime<Utc>>,
    cached_count: usize,
    force_rescan: bool,
    now: DateTime<Utc>,
) -> bool {
    if force_rescan || cached_count == 0 {
        return false;
    }
    match last_scanned_at {
        Some(t) => now - t < Duration::hours(COURSE_CACHE_TTL_HOURS),
        None => false,
    }
}

/// Picks the school for a scan: explicit request override first, then the
/// user's profile. Blank strings count as absent.
pub fn resolve_school(explicit: Option<&str>, user_school: Option<&str>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| user_school.map(str::trim).filter(|s| !s.is_empty()))
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub courses: Vec<CourseRecommendation>,
    pub cached: bool,
    pub message: Option<String>,
}

/// Serves a fresh cached course list for the skill, or regenerates it.
///
/// Misses without a resolvable school return an empty result with an
/// explanatory message instead of spending tokens. Misses with a school pay
/// a blocking quota check before the model call, then overwrite the cache
/// entry and its timestamp in a single row update.
pub async fn scan_courses(
    pool: &PgPool,
    backend: Arc<dyn GenerativeBackend>,
    user: &User,
    skill_id: Uuid,
    skill_name_override: Option<&str>,
    school_override: Option<&str>,
    force_rescan: bool,
) -> Result<ScanOutcome, AppError> {
    let node: Option<SkillNodeRow> = sqlx::query_as("SELECT * FROM skill_nodes WHERE id = $1")
        .bind(skill_id)
        .fetch_optional(pool)
        .await?;
    let node = node.ok_or_else(|| AppError::NotFound(format!("Skill {skill_id} not found")))?;

    scan_node(
        pool,
        backend,
        user,
        node,
        skill_name_override,
        school_override,
        force_rescan,
    )
    .await
}

/// Scan decision and refresh for an already-loaded node. The cache-hit and
/// no-school arms return before the pool or the backend is touched.
async fn scan_node(
    pool: &PgPool,
    backend: Arc<dyn GenerativeBackend>,
    user: &User,
    node: SkillNodeRow,
    skill_name_override: Option<&str>,
    school_override: Option<&str>,
    force_rescan: bool,
) -> Result<ScanOutcome, AppError> {
    let cached: Vec<CourseRecommendation> = node
        .cached_courses
        .as_ref()
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .context("cached_courses column holds malformed JSON")?
        .unwrap_or_default();

    if cache_is_fresh(
        node.courses_last_scanned_at,
        cached.len(),
        force_rescan,
        Utc::now(),
    ) {
        return Ok(ScanOutcome {
            courses: cached,
            cached: true,
            message: None,
        });
    }

    let Some(school) = resolve_school(school_override, user.school.as_deref()) else {
        return Ok(ScanOutcome {
            courses: vec![],
            cached: false,
            message: Some(
                "No school found for this user. Set a school on the account or pass one explicitly."
                    .to_string(),
            ),
        });
    };

    // Only a miss that is about to call the model pays the quota check — a
    // fresh cache hit must stay free for an exhausted user.
    let check = quota::check_limit(pool, user, COURSE_SCAN_ESTIMATED_TOKENS).await?;
    if !check.allowed {
        return Err(AppError::QuotaExceeded {
            limit: check.limit,
            current: check.current,
            remaining: check.remaining,
        });
    }

    let skill_name = skill_name_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&node.name);

    let response = backend
        .match_courses(skill_name, &school, MAX_COURSE_RESULTS)
        .await
        .map_err(|e| AppError::Generation(e.to_string()))?;

    let payload =
        serde_json::to_value(&response.value).context("failed to serialize course list")?;

    // Wholesale overwrite: the new scan replaces the prior list entirely.
    sqlx::query(
        "UPDATE skill_nodes SET cached_courses = $1, courses_last_scanned_at = now() WHERE id = $2",
    )
    .bind(&payload)
    .bind(node.id)
    .execute(pool)
    .await?;

    info!(
        "Refreshed course cache for skill {} ('{skill_name}' at '{school}'): {} courses",
        node.id,
        response.value.len()
    );

    quota::record_usage_best_effort(pool, user.id, response.tokens_consumed).await;

    Ok(ScanOutcome {
        courses: response.value,
        cached: false,
        message: None,
    })
}
