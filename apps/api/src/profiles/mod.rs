//! Profile Resolver — maps a (role, company, seniority, major) tuple to a
//! stable profile id, creating one if none exists.
//!
//! Equivalence is case-insensitive after trimming; the normalized key has a
//! unique index, and resolution goes through `INSERT .. ON CONFLICT DO
//! NOTHING RETURNING id` so two concurrent resolutions of the same new tuple
//! produce exactly one row.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::profile::{ProfileRow, Seniority};

/// Builds the normalized lookup key for a planning tuple.
/// Trimmed, lowercased, `|`-joined; a missing major is an empty segment.
pub fn normalized_key(
    role: &str,
    company: &str,
    seniority: Seniority,
    major: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}|{}",
        role.trim().to_lowercase(),
        company.trim().to_lowercase(),
        seniority.as_str(),
        major.map(|m| m.trim().to_lowercase()).unwrap_or_default()
    )
}

/// Resolves a planning tuple to its profile id, inserting a new profile on
/// first sight. Idempotent: equivalent tuples always map to the same id.
/// Display columns keep the caller's (trimmed) original casing.
pub async fn resolve(
    pool: &PgPool,
    role: &str,
    company: &str,
    seniority: Seniority,
    major: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let key = normalized_key(role, company, seniority, major);

    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO profiles (id, role, company, seniority, major, normalized_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (normalized_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(role.trim())
    .bind(company.trim())
    .bind(seniority.as_str())
    .bind(major.map(str::trim))
    .bind(&key)
    .fetch_optional(pool)
    .await?;

    if let Some(id) = inserted {
        info!("Created profile {id} for key '{key}'");
        return Ok(id);
    }

    // Conflict: the row already exists (possibly inserted by a concurrent
    // resolution that won the race). Read it back.
    sqlx::query_scalar("SELECT id FROM profiles WHERE normalized_key = $1")
        .bind(&key)
        .fetch_one(pool)
        .await
}

/// Loads a profile by id.
pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_tuples_share_a_key() {
        let a = normalized_key(" software engineer ", "ACME", Seniority::Mid, None);
        let b = normalized_key("Software Engineer", " acme", Seniority::Mid, None);
        assert_eq!(a, b);
        assert_eq!(a, "software engineer|acme|mid|");
    }

    #[test]
    fn test_major_participates_in_the_key() {
        let with = normalized_key("SRE", "Acme", Seniority::Senior, Some(" Physics "));
        let without = normalized_key("SRE", "Acme", Seniority::Senior, None);
        assert_ne!(with, without);
        assert!(with.ends_with("|physics"));
    }

    #[test]
    fn test_seniority_distinguishes_keys() {
        let entry = normalized_key("Engineer", "Acme", Seniority::Entry, None);
        let staff = normalized_key("Engineer", "Acme", Seniority::Staff, None);
        assert_ne!(entry, staff);
    }

    #[test]
    fn test_key_is_stable_across_calls() {
        let k1 = normalized_key("Data Scientist", "Initech", Seniority::Principal, Some("Math"));
        let k2 = normalized_key("Data Scientist", "Initech", Seniority::Principal, Some("Math"));
        assert_eq!(k1, k2);
    }
}
