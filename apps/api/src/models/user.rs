use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Billing plan tier: "free" | "pro". Anything else gets a zero quota.
    pub plan: String,
    /// School used to scope course matching. Nullable — users without one
    /// get an explanatory empty result from course scans.
    pub school: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Looks up a user by id.
pub async fn get_user(pool: &sqlx::PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
