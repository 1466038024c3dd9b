#![allow(dead_code)] // get_by_id / keyword search are the dispatch surface for the chat layer

//! Capability Registry — the process-wide catalog of tools the generative
//! agent may invoke, exposed to the model as function-calling schemas.
//!
//! Built once at startup from the built-in set and then carried immutably
//! in `AppState` as `Arc<CapabilityRegistry>` — explicit dependency
//! injection, no global mutable state. Purely declarative: no I/O, no
//! caching concerns.

pub mod builtin;
pub mod handlers;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

/// Recursive typed parameter schema for a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterSchema {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Object {
        properties: BTreeMap<String, ParameterSchema>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
    },
    Array {
        items: Box<ParameterSchema>,
    },
}

impl ParameterSchema {
    pub fn string(description: &str) -> Self {
        ParameterSchema::String {
            description: Some(description.to_string()),
        }
    }

    pub fn number(description: &str) -> Self {
        ParameterSchema::Number {
            description: Some(description.to_string()),
        }
    }

    pub fn object(
        properties: impl IntoIterator<Item = (&'static str, ParameterSchema)>,
        required: &[&str],
    ) -> Self {
        ParameterSchema::Object {
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Renders the JSON-Schema-shaped value the model's function-calling
    /// interface consumes.
    pub fn to_json_schema(&self) -> Value {
        match self {
            ParameterSchema::String { description } => typed_schema("string", description),
            ParameterSchema::Number { description } => typed_schema("number", description),
            ParameterSchema::Boolean { description } => typed_schema("boolean", description),
            ParameterSchema::Object {
                properties,
                required,
            } => {
                let props: serde_json::Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_schema()))
                    .collect();
                let mut schema = json!({ "type": "object", "properties": props });
                if !required.is_empty() {
                    schema["required"] = json!(required);
                }
                schema
            }
            ParameterSchema::Array { items } => {
                json!({ "type": "array", "items": items.to_json_schema() })
            }
        }
    }
}

fn typed_schema(ty: &str, description: &Option<String>) -> Value {
    match description {
        Some(d) => json!({ "type": ty, "description": d }),
        None => json!({ "type": ty }),
    }
}

/// A registered agent capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Unique id within the registry; also the tool name advertised to the
    /// model.
    pub id: String,
    pub description: String,
    pub keywords: BTreeSet<String>,
    /// Root parameter schema (an object in practice).
    pub parameters: ParameterSchema,
    /// Context fields the dispatcher must supply before invoking the
    /// handler (e.g. "school" for course matching).
    pub required_context_fields: BTreeSet<String>,
}

/// The shape consumed by the function-calling interface.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Insertion-ordered capability table. Re-registering an id overwrites the
/// prior entry and logs a conflict; it never errors.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityDescriptor>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: CapabilityDescriptor) {
        let id = descriptor.id.clone();
        if self.entries.insert(id.clone(), descriptor).is_some() {
            warn!("Capability '{id}' re-registered; overwriting previous entry");
        } else {
            self.order.push(id);
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&CapabilityDescriptor> {
        self.entries.get(id)
    }

    /// All capabilities in registration order.
    pub fn get_all(&self) -> Vec<&CapabilityDescriptor> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    /// Function schemas advertised to the model, one per capability, in
    /// registration order.
    pub fn to_tool_schemas(&self) -> Vec<ToolSchema> {
        self.get_all()
            .into_iter()
            .map(|c| ToolSchema {
                name: c.id.clone(),
                description: c.description.clone(),
                parameters: c.parameters.to_json_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, description: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: id.to_string(),
            description: description.to_string(),
            keywords: BTreeSet::new(),
            parameters: ParameterSchema::object(
                [("skill_name", ParameterSchema::string("The skill"))],
                &["skill_name"],
            ),
            required_context_fields: BTreeSet::new(),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = CapabilityRegistry::new();
        reg.register(descriptor("find_courses", "Find matching courses"));
        assert_eq!(reg.len(), 1);
        assert!(reg.get_by_id("find_courses").is_some());
        assert!(reg.get_by_id("missing").is_none());
    }

    #[test]
    fn test_reregistration_overwrites_without_duplicating() {
        let mut reg = CapabilityRegistry::new();
        reg.register(descriptor("find_courses", "v1"));
        reg.register(descriptor("generate_quiz", "quiz"));
        reg.register(descriptor("find_courses", "v2"));

        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get_by_id("find_courses").unwrap().description, "v2");
        // Registration order is preserved across an overwrite.
        let ids: Vec<&str> = reg.get_all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["find_courses", "generate_quiz"]);
    }

    #[test]
    fn test_tool_schema_shape() {
        let mut reg = CapabilityRegistry::new();
        reg.register(descriptor("find_courses", "Find matching courses"));

        let schemas = reg.to_tool_schemas();
        assert_eq!(schemas.len(), 1);
        let value = serde_json::to_value(&schemas[0]).unwrap();
        assert_eq!(value["name"], "find_courses");
        assert_eq!(value["parameters"]["type"], "object");
        assert_eq!(
            value["parameters"]["properties"]["skill_name"]["type"],
            "string"
        );
        assert_eq!(value["parameters"]["required"][0], "skill_name");
    }

    #[test]
    fn test_recursive_schema_renders_nested_types() {
        let schema = ParameterSchema::object(
            [(
                "cards",
                ParameterSchema::Array {
                    items: Box::new(ParameterSchema::object(
                        [
                            ("front", ParameterSchema::string("Question side")),
                            ("back", ParameterSchema::string("Answer side")),
                        ],
                        &["front", "back"],
                    )),
                },
            )],
            &["cards"],
        );

        let value = schema.to_json_schema();
        assert_eq!(value["properties"]["cards"]["type"], "array");
        assert_eq!(
            value["properties"]["cards"]["items"]["properties"]["front"]["type"],
            "string"
        );
    }

    #[test]
    fn test_schema_without_description_omits_the_field() {
        let value = ParameterSchema::String { description: None }.to_json_schema();
        assert!(value.get("description").is_none());
    }
}
