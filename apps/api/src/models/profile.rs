use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Seniority band for a planning target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Entry,
    Mid,
    Senior,
    Staff,
    Principal,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Entry => "entry",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Staff => "staff",
            Seniority::Principal => "principal",
        }
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Seniority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entry" => Ok(Seniority::Entry),
            "mid" => Ok(Seniority::Mid),
            "senior" => Ok(Seniority::Senior),
            "staff" => Ok(Seniority::Staff),
            "principal" => Ok(Seniority::Principal),
            other => Err(format!(
                "Unknown seniority '{other}' (expected entry|mid|senior|staff|principal)"
            )),
        }
    }
}

/// A resolved, deduplicated planning target. The normalized key guarantees
/// one row per (role, company, seniority, major) tuple; display columns keep
/// the caller's original casing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub role: String,
    pub company: String,
    pub seniority: String,
    pub major: Option<String>,
    pub normalized_key: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seniority_parses_case_insensitively() {
        assert_eq!(Seniority::from_str("Senior").unwrap(), Seniority::Senior);
        assert_eq!(Seniority::from_str(" STAFF ").unwrap(), Seniority::Staff);
        assert_eq!(Seniority::from_str("mid").unwrap(), Seniority::Mid);
    }

    #[test]
    fn test_seniority_rejects_unknown_band() {
        let err = Seniority::from_str("wizard").unwrap_err();
        assert!(err.contains("wizard"));
    }

    #[test]
    fn test_seniority_serde_roundtrip_is_lowercase() {
        let json = serde_json::to_string(&Seniority::Principal).unwrap();
        assert_eq!(json, "\"principal\"");
        let back: Seniority = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Seniority::Principal);
    }
}
