//! HTTP node: executes a named request template (spec §4.9).

use crate::capabilities::Capabilities;
use crate::edge::Payload;
use crate::error::CannoliResult;
use crate::http_client::{body_to_vars, interpolate};
use crate::node::{ExecutionInput, ExecutionOutput};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct HttpNode;

/// Collects the request body from incoming edges: either a single text payload or
/// a name→value map assembled from named edges.
fn collect_body(input: &ExecutionInput) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for edge in &input.incoming_edges {
        match &edge.payload {
            Some(Payload::Text(s)) if edge.subtype.is_named() => {
                map.insert(edge.text.clone(), serde_json::Value::String(s.clone()));
            }
            Some(Payload::Fields(fields)) => {
                for (k, v) in fields {
                    map.insert(k.clone(), serde_json::Value::String(v.clone()));
                }
            }
            _ => {}
        }
    }
    if map.is_empty() {
        if let Some(edge) = input.incoming_edges.first() {
            if let Some(Payload::Text(s)) = &edge.payload {
                return serde_json::Value::String(s.clone());
            }
        }
    }
    serde_json::Value::Object(map)
}

pub async fn execute(
    input: &ExecutionInput<'_>,
    caps: &Capabilities,
) -> CannoliResult<ExecutionOutput> {
    // The node's text names a template directly, or names a floating node whose
    // content *is* the template (spec §4.9).
    let template = input
        .substitution
        .floating
        .get(input.node.text.trim())
        .cloned()
        .unwrap_or_else(|| input.node.text.clone());

    let body_value = collect_body(input);
    let vars: HashMap<String, String> = body_to_vars(&body_value);
    let rendered_body = interpolate(&template, &vars)?;

    let response = caps.http.execute_template(&template, &rendered_body).await?;

    let mut output = ExecutionOutput::ok();
    for edge in &input.outgoing_edges {
        output
            .edge_writes
            .push((edge.id.clone(), Payload::Text(response.clone()), None));
    }
    Ok(output)
}
