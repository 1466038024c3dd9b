use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One generated skill graph per profile (unique index on profile_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillGraphRow {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A node in a skill graph. `slug` is the model-assigned identifier, unique
/// within its graph; `prerequisites` holds slugs of other nodes in the same
/// graph (validated before persist — no dangling edges).
///
/// `cached_courses` / `courses_last_scanned_at` are the per-skill course
/// cache, written only by the course scan path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillNodeRow {
    pub id: Uuid,
    pub graph_id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub prerequisites: Vec<String>,
    pub position: i32,
    pub cached_courses: Option<Value>,
    pub courses_last_scanned_at: Option<DateTime<Utc>>,
}

/// A single ranked course match for a skill, as stored in `cached_courses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecommendation {
    pub title: String,
    pub provider: String,
    /// 0.0 – 1.0, higher = more relevant to the skill.
    pub relevance_score: f64,
    pub url: Option<String>,
}
