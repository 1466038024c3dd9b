//! The fixed set of built-in capabilities, registered once at process start.

use std::collections::BTreeSet;

use crate::capabilities::{CapabilityDescriptor, CapabilityRegistry, ParameterSchema};

fn keywords(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|s| s.to_string()).collect()
}

/// Registers every built-in capability. Called exactly once from `main`
/// before the first request is served.
pub fn register_builtins(registry: &mut CapabilityRegistry) {
    registry.register(CapabilityDescriptor {
        id: "find_courses".to_string(),
        description: "Find ranked courses that teach a named skill at the user's school."
            .to_string(),
        keywords: keywords(&["courses", "classes", "catalog", "enroll"]),
        parameters: ParameterSchema::object(
            [
                (
                    "skill_name",
                    ParameterSchema::string("The skill to find courses for"),
                ),
                (
                    "school",
                    ParameterSchema::string("School whose catalog to search; defaults to the user's school"),
                ),
            ],
            &["skill_name"],
        ),
        required_context_fields: keywords(&["school"]),
    });

    registry.register(CapabilityDescriptor {
        id: "generate_flashcards".to_string(),
        description: "Generate study flashcards for a skill in the user's plan.".to_string(),
        keywords: keywords(&["flashcards", "study", "memorize", "review"]),
        parameters: ParameterSchema::object(
            [
                (
                    "skill_name",
                    ParameterSchema::string("The skill to generate flashcards for"),
                ),
                (
                    "count",
                    ParameterSchema::number("How many cards to generate (default 10)"),
                ),
            ],
            &["skill_name"],
        ),
        required_context_fields: keywords(&["profile_id"]),
    });

    registry.register(CapabilityDescriptor {
        id: "generate_quiz".to_string(),
        description: "Generate a short self-assessment quiz for a skill in the user's plan."
            .to_string(),
        keywords: keywords(&["quiz", "test", "assess", "practice"]),
        parameters: ParameterSchema::object(
            [
                (
                    "skill_name",
                    ParameterSchema::string("The skill to quiz on"),
                ),
                (
                    "difficulty",
                    ParameterSchema::string("easy | medium | hard (default medium)"),
                ),
            ],
            &["skill_name"],
        ),
        required_context_fields: keywords(&["profile_id"]),
    });
}

/// A registry pre-loaded with the built-in set.
pub fn default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    register_builtins(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_all_builtins() {
        let reg = default_registry();
        assert_eq!(reg.len(), 3);
        for id in ["find_courses", "generate_flashcards", "generate_quiz"] {
            assert!(reg.get_by_id(id).is_some(), "missing builtin '{id}'");
        }
    }

    #[test]
    fn test_find_courses_requires_school_context() {
        let reg = default_registry();
        let cap = reg.get_by_id("find_courses").unwrap();
        assert!(cap.required_context_fields.contains("school"));
    }

    #[test]
    fn test_builtin_schemas_are_objects() {
        let reg = default_registry();
        for schema in reg.to_tool_schemas() {
            let value = serde_json::to_value(&schema).unwrap();
            assert_eq!(value["parameters"]["type"], "object", "tool {}", schema.name);
        }
    }
}
