// All LLM prompt constants for Compass. Both generative operations (skill
// graph generation, course matching) live behind llm_client, so their
// prompts live here too.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for skill graph generation.
pub const SKILL_GRAPH_SYSTEM: &str = "You are an expert career-development curriculum designer. \
    Given a target role, company, and seniority, produce an ordered curriculum of skills \
    with prerequisite relationships. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Skill graph prompt template. Replace `{role}`, `{company}`, `{seniority}`
/// and `{major}` before sending.
pub const SKILL_GRAPH_PROMPT_TEMPLATE: &str = r#"Design a skill curriculum for the following planning target:

Role: {role}
Company: {company}
Seniority: {seniority}
Academic background: {major}

Return a JSON object with this EXACT schema (no extra fields):
{
  "nodes": [
    {
      "id": "rust-ownership",
      "name": "Rust Ownership & Borrowing",
      "description": "One or two sentences on what this skill covers and why it matters for the target role.",
      "prerequisites": ["rust-basics"]
    }
  ]
}

Rules:
- 8 to 15 nodes, ordered from foundational to advanced.
- "id" is a short lowercase kebab-case slug, unique within the list.
- Every entry in "prerequisites" MUST be the id of another node in this same list.
  Foundational nodes use an empty array. Never reference an id that is not in the list.
- Calibrate depth to the stated seniority: entry-level curricula emphasise
  fundamentals, staff/principal curricula emphasise architecture, scale and leadership.
- If an academic background is given, skip skills it already guarantees."#;

/// System prompt for course matching.
pub const COURSE_MATCH_SYSTEM: &str = "You are an expert academic advisor with broad knowledge \
    of university course catalogs and online course providers. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Course matching prompt template. Replace `{skill_name}`, `{school}` and
/// `{limit}` before sending.
pub const COURSE_MATCH_PROMPT_TEMPLATE: &str = r#"Find courses that teach the skill "{skill_name}" for a student at {school}.

Return a JSON array with this EXACT element schema (no extra fields):
[
  {
    "title": "CS 4414: Operating Systems",
    "provider": "{school}",
    "relevance_score": 0.92,
    "url": null
  }
]

Rules:
- At most {limit} courses, ranked by relevance_score descending.
- Prefer courses actually offered at {school}; fall back to well-known online
  providers (Coursera, edX, MIT OCW) only when the catalog has no match, and
  name the provider accordingly.
- relevance_score is between 0.0 and 1.0 and reflects how directly the course
  teaches the named skill.
- "url" is a catalog or course page URL when you are confident in it, else null.
  Never invent URLs."#;
