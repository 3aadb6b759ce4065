//! Reference node: read/write/create a named external note (spec §4.9).

use crate::capabilities::Capabilities;
use crate::edge::{EdgeSubtype, Modifier, Payload};
use crate::error::{CannoliError, CannoliResult};
use crate::node::{ExecutionInput, ExecutionOutput};
use crate::reference::substitute;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceMode {
    Read,
    /// `append = false` replaces the note body; `true` appends to it.
    Write { append: bool },
    Create,
}

#[derive(Debug, Clone)]
pub struct ReferenceNode {
    pub mode: ReferenceMode,
    /// Whether writes should also apply property-modifier edges to the note's
    /// frontmatter (spec §4.9, "respecting a property-include flag").
    pub include_properties_on_write: bool,
}

impl ReferenceNode {
    pub fn new(mode: ReferenceMode) -> Self {
        Self {
            mode,
            include_properties_on_write: false,
        }
    }
}

fn find_incoming_by_modifier<'a>(
    input: &'a ExecutionInput,
    modifier: Modifier,
) -> Vec<&'a crate::edge::Edge> {
    input
        .incoming_edges
        .iter()
        .filter(|e| e.modifier == modifier && e.payload.is_some())
        .collect()
}

fn edge_text(edge: &crate::edge::Edge) -> Option<String> {
    edge.payload.as_ref().and_then(|p| p.as_text().map(str::to_string))
}

async fn resolve_note_name(
    input: &ExecutionInput<'_>,
    caps: &Capabilities,
    warnings: &mut Vec<String>,
) -> CannoliResult<String> {
    if let Some(edge) = input
        .incoming_edges
        .iter()
        .find(|e| e.subtype == EdgeSubtype::Variable && e.text == "name")
    {
        if let Some(name) = edge_text(edge) {
            return Ok(name);
        }
    }
    substitute(&input.node.text, &input.substitution, caps, warnings).await
}

pub async fn execute(
    input: &ExecutionInput<'_>,
    node: &ReferenceNode,
    caps: &Capabilities,
) -> CannoliResult<ExecutionOutput> {
    let mut warnings = Vec::new();
    let mut output = ExecutionOutput::ok();
    let note_name = resolve_note_name(input, caps, &mut warnings).await?;

    match node.mode {
        ReferenceMode::Write { append } => {
            let content_edge = input
                .incoming_edges
                .iter()
                .find(|e| e.subtype == EdgeSubtype::Write || e.subtype == EdgeSubtype::Logging)
                .ok_or_else(|| {
                    CannoliError::node_execution(
                        input.node.id.as_str(),
                        "write-mode reference node has no incoming content edge",
                    )
                })?;
            let content = edge_text(content_edge).unwrap_or_default();

            match caps.vault.edit_note(&note_name, &content, append).await? {
                Some(()) => {}
                None => warnings.push(format!("note not found for write: {}", note_name)),
            }

            if node.include_properties_on_write {
                for edge in find_incoming_by_modifier(input, Modifier::Property) {
                    if let Some(value) = edge_text(edge) {
                        caps.vault.set_property(&note_name, &edge.text, &value).await?;
                    }
                }
            }
            for edge in &input.outgoing_edges {
                output
                    .edge_writes
                    .push((edge.id.clone(), Payload::Text(note_name.clone()), None));
            }
        }
        ReferenceMode::Create => {
            let path = find_incoming_by_modifier(input, Modifier::Folder)
                .first()
                .and_then(|e| edge_text(e));
            let content_edge = input
                .incoming_edges
                .iter()
                .find(|e| e.subtype == EdgeSubtype::Write);
            let body = content_edge.and_then(edge_text).unwrap_or_default();

            let mut frontmatter = String::new();
            let property_edges = find_incoming_by_modifier(input, Modifier::Property);
            if !property_edges.is_empty() {
                frontmatter.push_str("---\n");
                for edge in &property_edges {
                    if let Some(value) = edge_text(edge) {
                        frontmatter.push_str(&format!("{}: {}\n", edge.text, value));
                    }
                }
                frontmatter.push_str("---\n");
            }
            let full_content = format!("{}{}", frontmatter, body);

            let created = caps
                .vault
                .create_note_at_path(&note_name, path.as_deref(), Some(&full_content))
                .await?
                .ok_or_else(|| {
                    CannoliError::node_execution(input.node.id.as_str(), "failed to create note")
                })?;
            for edge in &input.outgoing_edges {
                output
                    .edge_writes
                    .push((edge.id.clone(), Payload::Text(created.clone()), None));
            }
        }
        ReferenceMode::Read => {
            let body = caps.vault.read_note(&note_name, None).await?;
            if body.is_none() {
                warnings.push(format!("note not found: {}", note_name));
            }
            for edge in &input.outgoing_edges {
                let payload = match edge.modifier {
                    Modifier::Property => {
                        let value = caps
                            .vault
                            .get_property(&note_name, &edge.text, false)
                            .await?
                            .unwrap_or_default();
                        value
                    }
                    Modifier::Folder => caps.vault.get_path(&note_name).await?.unwrap_or_default(),
                    Modifier::Note => note_name.clone(),
                    Modifier::None => body.clone().unwrap_or_default(),
                };
                output.edge_writes.push((edge.id.clone(), Payload::Text(payload), None));
            }
        }
    }

    output.warnings.append(&mut warnings);
    Ok(output)
}
