//! Formatter node: renders a double-quoted string template (spec §4.9).

use crate::capabilities::Capabilities;
use crate::edge::Payload;
use crate::error::CannoliResult;
use crate::node::{ExecutionInput, ExecutionOutput};
use crate::reference::substitute;

#[derive(Debug, Clone, Default)]
pub struct FormatterNode;

pub async fn execute(
    input: &ExecutionInput<'_>,
    caps: &Capabilities,
) -> CannoliResult<ExecutionOutput> {
    let mut warnings = Vec::new();
    let rendered = substitute(&input.node.text, &input.substitution, caps, &mut warnings).await?;

    let stripped = rendered
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .unwrap_or(rendered);

    let mut output = ExecutionOutput::ok();
    output.warnings.append(&mut warnings);
    for edge in &input.outgoing_edges {
        output
            .edge_writes
            .push((edge.id.clone(), Payload::Text(stripped.clone()), None));
    }
    output.new_text = Some(stripped);
    Ok(output)
}
