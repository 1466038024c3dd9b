//! Quota Ledger — per-user token consumption against a monthly limit.
//!
//! The check is a pure read and always blocking: no generative call may be
//! made without an `allowed` verdict. Recording is best-effort: a failed
//! write after a successful generation is logged and swallowed, never
//! surfaced to the user.

pub mod handlers;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::usage::UsageRecordRow;
use crate::models::user::User;

/// Pre-call cost estimate for a skill graph generation.
pub const SKILL_GRAPH_ESTIMATED_TOKENS: i64 = 6_000;
/// Pre-call cost estimate for a course-matching call.
pub const COURSE_SCAN_ESTIMATED_TOKENS: i64 = 2_500;

/// Verdict of a quota check.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub limit: i64,
    pub current: i64,
    pub remaining: i64,
}

/// Monthly token limit for a plan tier. Unknown tiers get no access.
pub fn monthly_limit_for_plan(plan: &str) -> i64 {
    match plan.trim().to_lowercase().as_str() {
        "free" => 50_000,
        "pro" => 2_000_000,
        _ => 0,
    }
}

/// Pure quota arithmetic. `remaining` is what would be left after the
/// proposed spend when allowed; when rejected it is what is left now
/// (that number goes into the 429 body).
pub fn evaluate(current: i64, limit: i64, estimated: i64) -> QuotaCheck {
    let allowed = current.saturating_add(estimated) <= limit;
    let remaining = if allowed {
        (limit - current - estimated).max(0)
    } else {
        (limit - current).max(0)
    };
    QuotaCheck {
        allowed,
        limit,
        current,
        remaining,
    }
}

/// UTC calendar-month period bounds: (first day of the month, first day of
/// the next month). Usage rows are keyed on the start date, so rollover is
/// simply a fresh row.
pub fn period_bounds(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    let start = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
        .expect("first of current month is a valid date");
    let end = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
    .expect("first of next month is a valid date");
    (start, end)
}

/// The user's usage row for the current period, if any tokens were spent.
async fn current_record(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UsageRecordRow>, sqlx::Error> {
    let (period_start, _) = period_bounds(Utc::now());
    sqlx::query_as("SELECT * FROM usage_records WHERE user_id = $1 AND period_start = $2")
        .bind(user_id)
        .bind(period_start)
        .fetch_optional(pool)
        .await
}

/// Checks whether `user` may spend `estimated` tokens this period.
/// Pure read — never mutates the ledger; callers decide whether to proceed.
pub async fn check_limit(
    pool: &PgPool,
    user: &User,
    estimated: i64,
) -> Result<QuotaCheck, sqlx::Error> {
    let limit = monthly_limit_for_plan(&user.plan);
    let current = current_record(pool, user.id)
        .await?
        .map(|r| r.tokens_used)
        .unwrap_or(0);

    Ok(evaluate(current, limit, estimated))
}

/// Adds `actual` tokens to the user's current-period record, creating the
/// row on first use in a period.
pub async fn record_usage(pool: &PgPool, user_id: Uuid, actual: i64) -> Result<(), sqlx::Error> {
    let (period_start, period_end) = period_bounds(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO usage_records (user_id, period_start, period_end, tokens_used, updated_at)
        VALUES ($1, $2, $3, $4, now())
        ON CONFLICT (user_id, period_start)
        DO UPDATE SET tokens_used = usage_records.tokens_used + EXCLUDED.tokens_used,
                      updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(period_start)
    .bind(period_end)
    .bind(actual.max(0))
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort variant used after a successful generation: accounting must
/// never fail the user-facing request.
pub async fn record_usage_best_effort(pool: &PgPool, user_id: Uuid, actual: i64) {
    if let Err(e) = record_usage(pool, user_id, actual).await {
        warn!("Failed to record {actual} tokens for user {user_id}: {e}");
    }
}

/// Usage summary surfaced to clients.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub plan_name: String,
    pub tokens_used: i64,
    pub monthly_limit: i64,
    pub remaining: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

/// Current-period usage for a user. Here `remaining` is simply
/// `max(0, limit - used)` — no proposed spend in play.
pub async fn get_usage(pool: &PgPool, user: &User) -> Result<UsageSummary, sqlx::Error> {
    let limit = monthly_limit_for_plan(&user.plan);
    let (period_start, period_end) = period_bounds(Utc::now());

    let tokens_used = current_record(pool, user.id)
        .await?
        .map(|r| r.tokens_used)
        .unwrap_or(0);

    Ok(UsageSummary {
        plan_name: user.plan.clone(),
        tokens_used,
        monthly_limit: limit,
        remaining: (limit - tokens_used).max(0),
        period_start,
        period_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quota_boundary_one_token_short() {
        // current = limit - 1, estimated = 2 → rejected
        let check = evaluate(49_999, 50_000, 2);
        assert!(!check.allowed);
        assert_eq!(check.remaining, 1);
    }

    #[test]
    fn test_quota_boundary_exact_fit() {
        // current = limit - 1, estimated = 1 → allowed with nothing left
        let check = evaluate(49_999, 50_000, 1);
        assert!(check.allowed);
        assert_eq!(check.remaining, 0);
    }

    #[test]
    fn test_zero_limit_means_no_access() {
        let check = evaluate(0, 0, 1);
        assert!(!check.allowed);
        assert_eq!(check.remaining, 0);
    }

    #[test]
    fn test_zero_cost_always_fits_within_limit() {
        let check = evaluate(0, 0, 0);
        assert!(check.allowed);
    }

    #[test]
    fn test_overdrawn_ledger_reports_zero_remaining() {
        // tokens_used can exceed limit when estimates undershot actuals
        let check = evaluate(60_000, 50_000, 100);
        assert!(!check.allowed);
        assert_eq!(check.remaining, 0);
    }

    #[test]
    fn test_plan_limits() {
        assert_eq!(monthly_limit_for_plan("free"), 50_000);
        assert_eq!(monthly_limit_for_plan("Pro"), 2_000_000);
        assert_eq!(monthly_limit_for_plan("enterprise-beta"), 0);
    }

    #[test]
    fn test_period_bounds_mid_month() {
        let now = Utc.with_ymd_and_hms(2025, 6, 17, 12, 0, 0).unwrap();
        let (start, end) = period_bounds(now);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    }

    #[test]
    fn test_period_bounds_december_rolls_into_next_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = period_bounds(now);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }
}
