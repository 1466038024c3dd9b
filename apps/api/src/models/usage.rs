use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user token consumption for one monthly period. One row per
/// (user_id, period_start); period rollover is a new row, so `tokens_used`
/// only ever increases within a period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UsageRecordRow {
    pub user_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub tokens_used: i64,
    pub updated_at: DateTime<Utc>,
}
