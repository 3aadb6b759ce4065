//! Node behaviors (spec §4.7, §4.9).
//!
//! A node's behavior is executed as a pure async function over a snapshot of its
//! inputs (the incoming/outgoing edges and enclosing groups at the moment its
//! dependencies were satisfied) and returns an [`ExecutionOutput`] describing what
//! to write back into the graph. The scheduler applies that output atomically,
//! following the message-passing design note in spec §9 rather than handing the
//! behavior a mutable reference into the shared object table.

pub mod call;
pub mod content;
pub mod floating;
pub mod formatter;
pub mod http;
pub mod reference_node;

use crate::edge::Edge;
use crate::edge::Payload;
use crate::graph::Rect;
use crate::group::Group;
use crate::ids::ObjectId;
use crate::llm::response::UsageMetadata;
use crate::messages::Message;
use crate::reference::{Reference, SubstitutionContext};

/// The concrete behavior a node performs, with its kind-specific configuration.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Call(call::CallNode),
    Content(content::ContentNode),
    Reference(reference_node::ReferenceNode),
    Http(http::HttpNode),
    Formatter(formatter::FormatterNode),
    Floating(floating::FloatingNode),
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Call(_) => "call",
            NodeKind::Content(_) => "content",
            NodeKind::Reference(_) => "reference",
            NodeKind::Http(_) => "http",
            NodeKind::Formatter(_) => "formatter",
            NodeKind::Floating(_) => "floating",
        }
    }
}

/// Node data as stored in the graph arena.
#[derive(Debug, Clone)]
pub struct NodeObject {
    pub id: ObjectId,
    pub text: String,
    pub rect: Rect,
    pub incoming_edges: Vec<ObjectId>,
    pub outgoing_edges: Vec<ObjectId>,
    /// Sorted innermost to outermost (spec §3).
    pub enclosing_groups: Vec<ObjectId>,
    pub kind: NodeKind,
}

impl NodeObject {
    pub fn new(id: ObjectId, text: impl Into<String>, rect: Rect, kind: NodeKind) -> Self {
        Self {
            id,
            text: text.into(),
            rect,
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
            enclosing_groups: Vec::new(),
            kind,
        }
    }
}

/// Everything a behavior needs, snapshotted at the moment the node started
/// executing.
pub struct ExecutionInput<'a> {
    pub node: &'a NodeObject,
    pub incoming_edges: Vec<Edge>,
    pub outgoing_edges: Vec<Edge>,
    pub enclosing_groups: Vec<Group>,
    pub substitution: SubstitutionContext,
    pub references: Vec<Reference>,
}

/// What a behavior wants written back into the graph once it finishes.
#[derive(Debug, Default)]
pub struct ExecutionOutput {
    pub error: Option<String>,
    pub warnings: Vec<String>,
    /// (edge id, payload, optional message snapshot) to load.
    pub edge_writes: Vec<(ObjectId, Payload, Option<Vec<Message>>)>,
    /// Edges to reject outright (e.g. the non-chosen `Choice` branches).
    pub edge_rejects: Vec<ObjectId>,
    /// Replacement text for the node itself (Content nodes, streaming chunks).
    pub new_text: Option<String>,
    /// Token usage reported by an LLM call this execution made, if any (spec §3,
    /// "usage accounting"); the scheduler folds this into the run's total.
    pub usage: Option<UsageMetadata>,
}

impl ExecutionOutput {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            error: Some(msg.into()),
            ..Self::default()
        }
    }
}
