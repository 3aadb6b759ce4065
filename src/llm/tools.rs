//! Function-call abstractions used to implement Choice, Form, and note-select
//! coercion on Call nodes (spec §4.7).
//!
//! A Call node whose outgoing edges imply a function call builds exactly one
//! [`ToolDefinition`] — `choice`, `form`, or `note_select` — and binds it to the
//! request. The model's [`ToolCall`] response drives edge rejection/loading.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Declares a callable function to the model, mirroring the JSON-schema shape
/// every provider's function-calling API expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Builds the `choice` function: an enum of branch names (spec §4.7).
    pub fn choice(branch_names: &[String]) -> Self {
        Self::new("choice", "Select exactly one of the available branches.").with_parameters(
            serde_json::json!({
                "type": "object",
                "properties": {
                    "branch": { "type": "string", "enum": branch_names }
                },
                "required": ["branch"]
            }),
        )
    }

    /// Builds the `form` function: one required field per distinct outgoing field
    /// name (spec §4.7).
    pub fn form(field_names: &[String]) -> Self {
        let properties: serde_json::Map<String, JsonValue> = field_names
            .iter()
            .map(|name| (name.clone(), serde_json::json!({ "type": "string" })))
            .collect();
        Self::new("form", "Fill in every requested field.").with_parameters(serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": field_names,
        }))
    }

    /// Builds the `note_select` function: an enum drawn from `[[...]]` occurrences
    /// in the assembled messages (spec §4.7).
    pub fn note_select(note_names: &[String]) -> Self {
        Self::new("note_select", "Select exactly one of the referenced notes.").with_parameters(
            serde_json::json!({
                "type": "object",
                "properties": {
                    "note": { "type": "string", "enum": note_names }
                },
                "required": ["note"]
            }),
        )
    }
}

/// A request from the model to invoke a named function with JSON arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: JsonValue,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}
