//! Call node: LLM request/response assembly and function-call coercion (spec §4.7).

use crate::capabilities::Capabilities;
use crate::edge::{EdgeSubtype, Modifier, Payload};
use crate::error::{CannoliError, CannoliResult};
use crate::llm::config::{ChatConfig, ChatRequest};
use crate::llm::tools::ToolDefinition;
use crate::messages::Message;
use crate::node::{ExecutionInput, ExecutionOutput};
use crate::reference::substitute;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Distinguishes how the node's function-call response is interpreted; all four
/// share the same message-assembly and config-resolution logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallVariant {
    /// No function call: a plain chat completion.
    Standard,
    /// `form` function call: one required field per outgoing `Field` edge.
    Form,
    /// `choice` function call: an enum of outgoing `Choice` edge names.
    Choose,
    /// Accumulates streamed output across iterations rather than overwriting it;
    /// otherwise identical to `Standard`.
    Accumulate,
}

#[derive(Debug, Clone)]
pub struct CallNode {
    pub variant: CallVariant,
}

impl CallNode {
    pub fn new(variant: CallVariant) -> Self {
        Self { variant }
    }
}

/// Resolves the node's `ChatConfig` by walking enclosing groups outermost to
/// innermost, then the node itself, applying `Config` edge overrides (spec §4.7).
/// Groups are supplied innermost-first (per [`crate::node::NodeObject::enclosing_groups`]),
/// so we consume them in reverse.
fn resolve_config(input: &ExecutionInput) -> ChatConfig {
    let mut config = ChatConfig::default();

    let apply_config_edges = |config: &mut ChatConfig, edge_ids: &[crate::ids::ObjectId], edges: &[crate::edge::Edge]| {
        for id in edge_ids {
            if let Some(edge) = edges.iter().find(|e| &e.id == id) {
                if edge.subtype == EdgeSubtype::Config {
                    if let Some(Payload::Text(value)) = &edge.payload {
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(value) {
                            config.apply_override(&edge.text, json);
                        } else {
                            config.apply_override(&edge.text, serde_json::Value::String(value.clone()));
                        }
                    }
                }
            }
        }
    };

    for group in input.enclosing_groups.iter().rev() {
        apply_config_edges(&mut config, &group.incoming_edges, &input.incoming_edges);
    }
    apply_config_edges(
        &mut config,
        &input.node.incoming_edges,
        &input.incoming_edges,
    );

    config
}

/// Step 1/2 of message assembly: direct edges carrying messages, falling back to
/// indirect (enclosing-group) edges whose `add_messages` flag is set.
fn assemble_history(input: &ExecutionInput) -> Vec<Message> {
    let mut direct: Vec<Message> = Vec::new();
    let mut system_prefix: Vec<Message> = Vec::new();

    for edge in &input.incoming_edges {
        if let Some(msgs) = &edge.messages {
            if edge.subtype == EdgeSubtype::SystemMessage {
                system_prefix.extend(msgs.iter().cloned());
            } else {
                direct.extend(msgs.iter().cloned());
            }
        }
    }

    if !direct.is_empty() || !system_prefix.is_empty() {
        let mut out = system_prefix;
        out.extend(direct);
        return out;
    }

    // No direct message-carrying edges: fall back to indirect edges of enclosing
    // groups whose `add_messages` flag is set.
    let mut indirect = Vec::new();
    for group in &input.enclosing_groups {
        for id in &group.incoming_edges {
            // indirect edges are looked up by id among the full incoming snapshot;
            // group incoming edges aren't necessarily in `input.incoming_edges`
            // (they belong to the group, not the node), so this is a best-effort
            // scan restricted to what was captured for this execution.
            if let Some(edge) = input.incoming_edges.iter().find(|e| &e.id == id) {
                if edge.add_messages {
                    if let Some(msgs) = &edge.messages {
                        indirect.extend(msgs.iter().cloned());
                    }
                }
            }
        }
    }
    indirect
}

fn distinct_outgoing_names(input: &ExecutionInput, subtype: EdgeSubtype) -> Vec<String> {
    let mut names: Vec<String> = input
        .outgoing_edges
        .iter()
        .filter(|e| e.subtype == subtype)
        .map(|e| e.text.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

fn note_select_candidates(history: &[Message], rendered_user_text: &str) -> Vec<String> {
    let re = regex::Regex::new(r"\[\[([^\]]+)\]\]").expect("static regex");
    let mut names = std::collections::BTreeSet::new();
    for msg in history {
        for cap in re.captures_iter(&msg.text()) {
            names.insert(cap[1].to_string());
        }
    }
    for cap in re.captures_iter(rendered_user_text) {
        names.insert(cap[1].to_string());
    }
    names.into_iter().collect()
}

pub async fn execute(
    input: &ExecutionInput<'_>,
    node: &CallNode,
    caps: &Capabilities,
) -> CannoliResult<ExecutionOutput> {
    let mut warnings = Vec::new();
    let config = resolve_config(input);
    let history = assemble_history(input);

    let rendered = substitute(
        &input.node.text,
        &input.substitution,
        caps,
        &mut warnings,
    )
    .await?;
    let mut messages = history;
    messages.push(Message::human(rendered.clone()));

    let has_choice_outgoing = input
        .outgoing_edges
        .iter()
        .any(|e| e.subtype == EdgeSubtype::Choice);
    let has_field_outgoing = input
        .outgoing_edges
        .iter()
        .any(|e| e.subtype == EdgeSubtype::Field);
    let has_note_modifier_outgoing = input
        .outgoing_edges
        .iter()
        .any(|e| e.modifier == Modifier::Note);
    let has_chat_response_outgoing = input
        .outgoing_edges
        .iter()
        .any(|e| e.subtype == EdgeSubtype::ChatResponse);

    let mut tools: Vec<ToolDefinition> = Vec::new();
    if node.variant == CallVariant::Choose || has_choice_outgoing {
        let names = distinct_outgoing_names(input, EdgeSubtype::Choice);
        if names.is_empty() {
            return Err(CannoliError::validation(
                "Choose call node has no outgoing Choice edges",
            ));
        }
        tools.push(ToolDefinition::choice(&names));
    } else if node.variant == CallVariant::Form || has_field_outgoing {
        let names = distinct_outgoing_names(input, EdgeSubtype::Field);
        if names.is_empty() {
            return Err(CannoliError::validation(
                "Form call node has no outgoing Field edges",
            ));
        }
        tools.push(ToolDefinition::form(&names));
    } else if has_note_modifier_outgoing {
        let candidates = note_select_candidates(&messages, &rendered);
        tools.push(ToolDefinition::note_select(&candidates));
    }

    let mut request = ChatRequest::new(messages.clone()).with_config(config);
    if !tools.is_empty() {
        request = request.with_tools(tools);
    }

    let mut output = ExecutionOutput::ok();
    output.warnings.append(&mut warnings);

    let assistant_message = if has_chat_response_outgoing {
        let mut stream = caps.llm.stream(request).await?;
        let mut aggregated = String::new();
        while let Some(chunk) = stream.chunks.next().await {
            aggregated.push_str(&chunk.delta);
            for edge in input
                .outgoing_edges
                .iter()
                .filter(|e| e.subtype == EdgeSubtype::ChatResponse)
            {
                output
                    .edge_writes
                    .push((edge.id.clone(), Payload::Text(chunk.delta.clone()), None));
            }
        }
        Message::assistant(aggregated)
    } else {
        let response = caps.llm.chat(request).await?;
        output.usage = response.usage;
        response.message
    };

    let mut full_history = messages;
    full_history.push(assistant_message.clone());

    route_outputs(input, node, &assistant_message, &full_history, &mut output)?;

    Ok(output)
}

fn route_outputs(
    input: &ExecutionInput,
    node: &CallNode,
    assistant_message: &Message,
    full_history: &[Message],
    output: &mut ExecutionOutput,
) -> CannoliResult<()> {
    let tool_call = assistant_message.tool_calls.as_ref().and_then(|c| c.first());

    if node.variant == CallVariant::Choose
        || input
            .outgoing_edges
            .iter()
            .any(|e| e.subtype == EdgeSubtype::Choice)
    {
        let chosen = tool_call
            .and_then(|c| c.arguments.get("branch"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CannoliError::node_execution(input.node.id.as_str(), "model did not select a branch"))?
            .to_string();

        let mut seen_chosen = false;
        for edge in input.outgoing_edges.iter().filter(|e| e.subtype == EdgeSubtype::Choice) {
            if edge.text == chosen && !seen_chosen {
                seen_chosen = true;
                output.edge_writes.push((
                    edge.id.clone(),
                    Payload::Text(assistant_message.text()),
                    Some(full_history.to_vec()),
                ));
            } else {
                output.edge_rejects.push(edge.id.clone());
            }
        }
        for edge in input.outgoing_edges.iter().filter(|e| e.subtype != EdgeSubtype::Choice) {
            load_non_function_edge(edge, assistant_message, full_history, output);
        }
        return Ok(());
    }

    if node.variant == CallVariant::Form
        || input
            .outgoing_edges
            .iter()
            .any(|e| e.subtype == EdgeSubtype::Field)
    {
        let args = tool_call.map(|c| &c.arguments);
        for edge in input.outgoing_edges.iter().filter(|e| e.subtype == EdgeSubtype::Field) {
            let value = args
                .and_then(|a| a.get(&edge.text))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default();
            let value = if edge.modifier == Modifier::Note {
                format!("[[{}]]", value)
            } else {
                value
            };
            output
                .edge_writes
                .push((edge.id.clone(), Payload::Text(value), None));
        }
        for edge in input.outgoing_edges.iter().filter(|e| e.subtype != EdgeSubtype::Field) {
            load_non_function_edge(edge, assistant_message, full_history, output);
        }
        return Ok(());
    }

    for edge in &input.outgoing_edges {
        load_non_function_edge(edge, assistant_message, full_history, output);
    }
    Ok(())
}

fn load_non_function_edge(
    edge: &crate::edge::Edge,
    assistant_message: &Message,
    full_history: &[Message],
    output: &mut ExecutionOutput,
) {
    if edge.subtype == EdgeSubtype::ChatResponse {
        // Already streamed incrementally; nothing more to write.
        return;
    }
    let payload = Payload::Text(assistant_message.text());
    let messages = if edge.subtype.always_carries_messages() || edge.add_messages {
        Some(full_history.to_vec())
    } else {
        None
    };
    output.edge_writes.push((edge.id.clone(), payload, messages));
}
