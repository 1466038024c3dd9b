//! Generative backend — trait seam between the caching layer and the LLM.
//!
//! The caching/quota layer never talks to `LlmClient` directly; it calls
//! this trait, carried in `AppState` as `Arc<dyn GenerativeBackend>`, so
//! tests swap in counting mocks without any network.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::llm_client::prompts::{
    COURSE_MATCH_PROMPT_TEMPLATE, COURSE_MATCH_SYSTEM, SKILL_GRAPH_PROMPT_TEMPLATE,
    SKILL_GRAPH_SYSTEM,
};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::graph::CourseRecommendation;
use crate::models::profile::Seniority;

/// Wall-clock bound on a single generative call, distinct from the quota
/// check. A stuck upstream call must not hold the single-flight lock open
/// indefinitely.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(90);

/// The planning target a skill graph is generated for. Display values,
/// not normalized keys — these go into the prompt.
#[derive(Debug, Clone)]
pub struct PlanTarget {
    pub role: String,
    pub company: String,
    pub seniority: Seniority,
    pub major: Option<String>,
}

/// A skill graph as returned by the model, before validation and persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedGraph {
    pub nodes: Vec<GeneratedNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedNode {
    /// Model-assigned kebab-case slug, unique within the graph.
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

/// A backend result plus the actual token cost of producing it.
#[derive(Debug, Clone)]
pub struct BackendResponse<T> {
    pub value: T,
    pub tokens_consumed: i64,
}

/// Errors from the generative backend. `Clone` because single-flight
/// broadcasts the leader's failure to every waiter.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("generative call timed out after {}s", GENERATION_TIMEOUT.as_secs())]
    Timeout,

    #[error("generative call failed: {0}")]
    Api(String),

    #[error("generative output malformed: {0}")]
    Malformed(String),
}

impl From<LlmError> for BackendError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Parse(p) => BackendError::Malformed(p.to_string()),
            LlmError::EmptyContent => BackendError::Malformed("empty content".to_string()),
            other => BackendError::Api(other.to_string()),
        }
    }
}

/// The two metered generative operations Compass performs.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Generates a skill graph for a planning target.
    async fn generate_skill_graph(
        &self,
        target: &PlanTarget,
    ) -> Result<BackendResponse<GeneratedGraph>, BackendError>;

    /// Matches up to `limit` courses for a skill at a school, ranked by
    /// relevance.
    async fn match_courses(
        &self,
        skill_name: &str,
        school: &str,
        limit: usize,
    ) -> Result<BackendResponse<Vec<CourseRecommendation>>, BackendError>;
}

/// Production backend over the Anthropic Messages API.
pub struct LlmBackend {
    llm: LlmClient,
}

impl LlmBackend {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl GenerativeBackend for LlmBackend {
    async fn generate_skill_graph(
        &self,
        target: &PlanTarget,
    ) -> Result<BackendResponse<GeneratedGraph>, BackendError> {
        let prompt = SKILL_GRAPH_PROMPT_TEMPLATE
            .replace("{role}", &target.role)
            .replace("{company}", &target.company)
            .replace("{seniority}", target.seniority.as_str())
            .replace("{major}", target.major.as_deref().unwrap_or("not specified"));

        let (graph, usage): (GeneratedGraph, _) = tokio::time::timeout(
            GENERATION_TIMEOUT,
            self.llm.call_json(&prompt, SKILL_GRAPH_SYSTEM),
        )
        .await
        .map_err(|_| BackendError::Timeout)??;

        info!(
            "Skill graph generated: {} nodes, {} tokens",
            graph.nodes.len(),
            usage.total()
        );

        Ok(BackendResponse {
            value: graph,
            tokens_consumed: usage.total(),
        })
    }

    async fn match_courses(
        &self,
        skill_name: &str,
        school: &str,
        limit: usize,
    ) -> Result<BackendResponse<Vec<CourseRecommendation>>, BackendError> {
        let prompt = COURSE_MATCH_PROMPT_TEMPLATE
            .replace("{skill_name}", skill_name)
            .replace("{school}", school)
            .replace("{limit}", &limit.to_string());

        let (mut courses, usage): (Vec<CourseRecommendation>, _) = tokio::time::timeout(
            GENERATION_TIMEOUT,
            self.llm.call_json(&prompt, COURSE_MATCH_SYSTEM),
        )
        .await
        .map_err(|_| BackendError::Timeout)??;

        // The prompt bounds the count, but the model is not trusted to.
        courses.truncate(limit);

        info!(
            "Matched {} courses for '{skill_name}' at '{school}' ({} tokens)",
            courses.len(),
            usage.total()
        );

        Ok(BackendResponse {
            value: courses,
            tokens_consumed: usage.total(),
        })
    }
}
