//! Floating node: a named constant, already `Complete` at graph construction
//! (spec §4.9, §3).

use crate::edge::Payload;
use crate::node::{ExecutionInput, ExecutionOutput};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FloatingNode {
    pub name: String,
    pub value: String,
    /// Addressable properties parsed out of a `---...---` YAML frontmatter block
    /// in the value, if present.
    pub properties: HashMap<String, String>,
}

/// Parses raw node text: first line is `[Name]`, remainder is the value, which may
/// itself contain a YAML frontmatter block with addressable properties.
pub fn parse(raw_text: &str) -> FloatingNode {
    let mut lines = raw_text.lines();
    let name_line = lines.next().unwrap_or_default().trim();
    let name = name_line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(name_line)
        .to_string();

    let rest: String = lines.collect::<Vec<_>>().join("\n");
    let mut properties = HashMap::new();
    let mut value = rest.clone();

    if let Some(body) = rest.strip_prefix("---\n") {
        if let Some(end) = body.find("\n---") {
            let yaml = &body[..end];
            for line in yaml.lines() {
                if let Some((k, v)) = line.split_once(':') {
                    properties.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
            value = body[end + 4..].trim_start_matches('\n').to_string();
        }
    }

    FloatingNode {
        name,
        value,
        properties,
    }
}

/// Floating nodes never execute in the scheduler's sense (they start `Complete`);
/// this exists only so the node-dispatch table in `scheduler.rs` can route to it
/// uniformly if a graph fixture ever re-evaluates one (e.g. reset-then-redrive in a
/// loop that encloses a floating node).
pub fn execute(input: &ExecutionInput, node: &FloatingNode) -> ExecutionOutput {
    let mut output = ExecutionOutput::ok();
    for edge in &input.outgoing_edges {
        output
            .edge_writes
            .push((edge.id.clone(), Payload::Text(node.value.clone()), None));
    }
    output
}
