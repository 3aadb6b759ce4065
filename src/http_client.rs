//! The injected HTTP template collaborator (spec §6, §4.9).
//!
//! Cannoli never performs the request itself; an HTTP node resolves a template name
//! (or a floating node containing one) and hands it, plus an interpolated body, to
//! an [`HttpTemplateExecutor`]. The actual `{{var}}` interpolation rules below are
//! implemented by the core (they govern what the node passes in), while dispatching
//! the HTTP request is the host's job.

use crate::error::{CannoliError, CannoliResult};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

#[async_trait]
pub trait HttpTemplateExecutor: Send + Sync {
    /// Executes a named template with an already-interpolated body.
    async fn execute_template(&self, template: &str, body: &str) -> CannoliResult<String>;
}

/// Interpolates `{{var}}` placeholders in `template` from `vars`.
///
/// Every placeholder in the template must have a matching key in `vars` and every
/// key in `vars` must be used by the template; otherwise this is an error (spec
/// §4.9, "missing or extra variables are errors").
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> CannoliResult<String> {
    let re = Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("static regex");
    let mut used = std::collections::HashSet::new();
    let mut missing = Vec::new();

    let rendered = re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        match vars.get(key) {
            Some(value) => {
                used.insert(key.to_string());
                value.clone()
            }
            None => {
                missing.push(key.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(CannoliError::validation(format!(
            "HTTP template references undefined variables: {}",
            missing.join(", ")
        )));
    }

    let extra: Vec<&String> = vars.keys().filter(|k| !used.contains(*k)).collect();
    if !extra.is_empty() {
        return Err(CannoliError::validation(format!(
            "HTTP template body supplies unused variables: {}",
            extra
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(rendered.into_owned())
}

/// Normalizes an HTTP node's payload (single string or name→value map) into the
/// variable table `interpolate` expects.
pub fn body_to_vars(body: &JsonValue) -> HashMap<String, String> {
    match body {
        JsonValue::Object(map) => map
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()),
                )
            })
            .collect(),
        JsonValue::String(s) => {
            let mut m = HashMap::new();
            m.insert("body".to_string(), s.clone());
            m
        }
        other => {
            let mut m = HashMap::new();
            m.insert("body".to_string(), other.to_string());
            m
        }
    }
}
