//! Content node: stores or emits rendered text (spec §4.9, "Standard content").

use crate::capabilities::Capabilities;
use crate::edge::{EdgeSubtype, Payload};
use crate::error::CannoliResult;
use crate::node::{ExecutionInput, ExecutionOutput};
use crate::reference::substitute;

#[derive(Debug, Clone, Default)]
pub struct ContentNode;

fn producing_edge(input: &ExecutionInput) -> Option<&crate::edge::Edge> {
    input.incoming_edges.iter().find(|e| {
        matches!(
            e.subtype,
            EdgeSubtype::Write | EdgeSubtype::Logging | EdgeSubtype::ChatResponse | EdgeSubtype::List
        )
    })
}

/// A standard Content node has incoming edges iff any upstream edge targets it;
/// used by group reset (spec §4.6) to decide whether resetting clears its text.
pub fn has_incoming_producer(node: &crate::node::NodeObject) -> bool {
    !node.incoming_edges.is_empty()
}

pub async fn execute(
    input: &ExecutionInput<'_>,
    caps: &Capabilities,
) -> CannoliResult<ExecutionOutput> {
    let mut warnings = Vec::new();

    let text = if let Some(edge) = producing_edge(input) {
        match &edge.payload {
            Some(Payload::Text(s)) => s.clone(),
            Some(Payload::Fields(map)) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    } else {
        substitute(&input.node.text, &input.substitution, caps, &mut warnings).await?
    };

    let mut output = ExecutionOutput::ok();
    output.warnings.append(&mut warnings);
    output.new_text = Some(text.clone());

    for edge in &input.outgoing_edges {
        output
            .edge_writes
            .push((edge.id.clone(), Payload::Text(text.clone()), None));
    }

    Ok(output)
}
