//! Skill graph generation — cache read, single-flight miss handling,
//! validation, and transactional persistence.
//!
//! Flow: check for a persisted graph → on miss, lead (or join) the flight
//! for the profile → generate via the backend → validate → persist all
//! nodes in one transaction → record actual token usage (best-effort) →
//! broadcast to waiters.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::backend::{GeneratedGraph, GenerativeBackend, PlanTarget};
use crate::models::graph::{SkillGraphRow, SkillNodeRow};
use crate::planning::flight::{FlightError, Flights};
use crate::quota;

/// A persisted skill graph plus the token cost of producing it (0 on a
/// cache hit).
#[derive(Debug, Clone)]
pub struct PlanArtifacts {
    pub graph: SkillGraphRow,
    pub nodes: Vec<SkillNodeRow>,
    pub tokens_consumed: i64,
}

pub type PlanFlights = Flights<PlanArtifacts>;

/// Returns the cached graph for `profile_id`, or generates, persists and
/// returns a new one. The boolean is `true` on a cache hit.
///
/// Concurrent calls for the same profile share one generative call through
/// the flight table; the leader's failure is re-thrown to every waiter and
/// nothing is persisted on failure.
pub async fn get_or_generate(
    pool: &PgPool,
    backend: Arc<dyn GenerativeBackend>,
    flights: &PlanFlights,
    user_id: Uuid,
    profile_id: Uuid,
    target: PlanTarget,
    force_regenerate: bool,
) -> Result<(PlanArtifacts, bool), AppError> {
    if !force_regenerate {
        if let Some(existing) = load_plan(pool, profile_id).await? {
            return Ok((existing, true));
        }
    }

    let artifacts = flights
        .run(profile_id, {
            let pool = pool.clone();
            move || generate_and_persist(pool, backend, user_id, profile_id, target, force_regenerate)
        })
        .await?;

    Ok((artifacts, false))
}

/// Leader body of a flight. Re-checks the cache first: a caller that missed
/// the flight-table entry of an already-settled generation must not trigger
/// a duplicate one.
async fn generate_and_persist(
    pool: PgPool,
    backend: Arc<dyn GenerativeBackend>,
    user_id: Uuid,
    profile_id: Uuid,
    target: PlanTarget,
    force_regenerate: bool,
) -> Result<PlanArtifacts, FlightError> {
    if !force_regenerate {
        if let Some(existing) = load_plan(&pool, profile_id)
            .await
            .map_err(|e| FlightError::Storage(e.to_string()))?
        {
            return Ok(existing);
        }
    }

    let response = backend.generate_skill_graph(&target).await?;
    validate_generated_graph(&response.value).map_err(FlightError::InvalidGraph)?;

    let artifacts = persist_graph(&pool, profile_id, &response.value, response.tokens_consumed)
        .await
        .map_err(|e| FlightError::Storage(e.to_string()))?;

    info!(
        "Persisted skill graph {} ({} nodes) for profile {profile_id}",
        artifacts.graph.id,
        artifacts.nodes.len()
    );

    // Accounting is best-effort: the graph is already persisted and the
    // user-facing request must not fail on a ledger write.
    quota::record_usage_best_effort(&pool, user_id, response.tokens_consumed).await;

    Ok(artifacts)
}

/// Checks the structural invariants of a generated graph before anything is
/// persisted: non-empty, unique node ids, and prerequisite edges that stay
/// inside the graph (no dangling edges, no self-loops).
pub fn validate_generated_graph(graph: &GeneratedGraph) -> Result<(), String> {
    if graph.nodes.is_empty() {
        return Err("graph has no nodes".to_string());
    }

    let mut ids: HashSet<&str> = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if node.id.trim().is_empty() {
            return Err(format!("node '{}' has an empty id", node.name));
        }
        if !ids.insert(node.id.as_str()) {
            return Err(format!("duplicate node id '{}'", node.id));
        }
    }

    for node in &graph.nodes {
        for prereq in &node.prerequisites {
            if prereq == &node.id {
                return Err(format!("node '{}' lists itself as a prerequisite", node.id));
            }
            if !ids.contains(prereq.as_str()) {
                return Err(format!(
                    "node '{}' references unknown prerequisite '{prereq}'",
                    node.id
                ));
            }
        }
    }

    Ok(())
}

/// Persists a validated graph: all nodes or none. Replaces any previous
/// graph for the profile (the explicit-regeneration path; cascade removes
/// its nodes and their course caches).
async fn persist_graph(
    pool: &PgPool,
    profile_id: Uuid,
    generated: &GeneratedGraph,
    tokens_consumed: i64,
) -> Result<PlanArtifacts, sqlx::Error> {
    let graph_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM skill_graphs WHERE profile_id = $1")
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO skill_graphs (id, profile_id, created_at) VALUES ($1, $2, $3)")
        .bind(graph_id)
        .bind(profile_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let mut nodes = Vec::with_capacity(generated.nodes.len());
    for (position, node) in generated.nodes.iter().enumerate() {
        let row = SkillNodeRow {
            id: Uuid::new_v4(),
            graph_id,
            slug: node.id.clone(),
            name: node.name.clone(),
            description: node.description.clone(),
            prerequisites: node.prerequisites.clone(),
            position: position as i32,
            cached_courses: None,
            courses_last_scanned_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO skill_nodes
                (id, graph_id, slug, name, description, prerequisites, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.id)
        .bind(row.graph_id)
        .bind(&row.slug)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.prerequisites)
        .bind(row.position)
        .execute(&mut *tx)
        .await?;

        nodes.push(row);
    }

    tx.commit().await?;

    Ok(PlanArtifacts {
        graph: SkillGraphRow {
            id: graph_id,
            profile_id,
            created_at: now,
        },
        nodes,
        tokens_consumed,
    })
}

/// Loads the persisted graph for a profile, nodes in curriculum order.
async fn load_plan(pool: &PgPool, profile_id: Uuid) -> Result<Option<PlanArtifacts>, sqlx::Error> {
    let graph: Option<SkillGraphRow> =
        sqlx::query_as("SELECT * FROM skill_graphs WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(pool)
            .await?;

    let Some(graph) = graph else {
        return Ok(None);
    };

    let nodes: Vec<SkillNodeRow> =
        sqlx::query_as("SELECT * FROM skill_nodes WHERE graph_id = $1 ORDER BY position ASC")
            .bind(graph.id)
            .fetch_all(pool)
            .await?;

    Ok(Some(PlanArtifacts {
        graph,
        nodes,
        tokens_consumed: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::backend::GeneratedNode;

    fn node(id: &str, prereqs: &[&str]) -> GeneratedNode {
        GeneratedNode {
            id: id.to_string(),
            name: id.replace('-', " "),
            description: format!("Covers {id}"),
            prerequisites: prereqs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_valid_graph_passes() {
        let graph = GeneratedGraph {
            nodes: vec![
                node("rust-basics", &[]),
                node("rust-ownership", &["rust-basics"]),
                node("async-rust", &["rust-ownership", "rust-basics"]),
            ],
        };
        assert!(validate_generated_graph(&graph).is_ok());
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = GeneratedGraph { nodes: vec![] };
        assert!(validate_generated_graph(&graph).is_err());
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let graph = GeneratedGraph {
            nodes: vec![node("rust-basics", &[]), node("rust-basics", &[])],
        };
        let err = validate_generated_graph(&graph).unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_dangling_prerequisite_rejected() {
        let graph = GeneratedGraph {
            nodes: vec![node("async-rust", &["rust-ownership"])],
        };
        let err = validate_generated_graph(&graph).unwrap_err();
        assert!(err.contains("rust-ownership"));
    }

    #[test]
    fn test_self_prerequisite_rejected() {
        let graph = GeneratedGraph {
            nodes: vec![node("rust-basics", &["rust-basics"])],
        };
        let err = validate_generated_graph(&graph).unwrap_err();
        assert!(err.contains("itself"));
    }

    #[test]
    fn test_empty_node_id_rejected() {
        let graph = GeneratedGraph {
            nodes: vec![node("  ", &[])],
        };
        let err = validate_generated_graph(&graph).unwrap_err();
        assert!(err.contains("empty id"));
    }
}
