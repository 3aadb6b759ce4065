//! Edge transport: subtype semantics and payload/message propagation (spec §4.5).

use crate::ids::ObjectId;
use crate::messages::Message;
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Determines message-accumulation and payload semantics for an edge (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeSubtype {
    /// Always propagates messages; appended to the assembled prompt in order.
    Chat,
    /// Always propagates messages; contributed as a system-role message unshifted
    /// to the front of the assembled prompt.
    SystemMessage,
    /// Accumulates a human-readable transcript (loop/version headers + role-tagged
    /// messages + config dump) into `content`; consumed by Content nodes.
    Logging,
    /// Named payload used to fill a `form` function-call field.
    Field,
    /// Named payload used as a `choice` function-call branch.
    Choice,
    /// Named payload, free-form category tag.
    Category,
    /// Named payload produced by a for-each group fan-out.
    List,
    /// Named payload that merges multiple upstream branches.
    Merge,
    /// Named payload carrying an arbitrary variable.
    Variable,
    /// Mutates the downstream node's model config rather than producing visible
    /// content.
    Config,
    /// Carries a streamed assistant response chunk-by-chunk (spec §4.7).
    ChatResponse,
    /// A plain content-producing edge into a Content/Reference node ("write").
    Write,
}

impl EdgeSubtype {
    /// Chat and SystemMessage edges always propagate messages; any other subtype
    /// propagates messages only when `addMessages` is explicitly set (spec §4.5).
    pub fn always_carries_messages(self) -> bool {
        matches!(self, EdgeSubtype::Chat | EdgeSubtype::SystemMessage)
    }

    /// Only Field/Choice/Category/List/Merge/Variable/Config edges carry a `name`
    /// used to key their payload.
    pub fn is_named(self) -> bool {
        matches!(
            self,
            EdgeSubtype::Field
                | EdgeSubtype::Choice
                | EdgeSubtype::Category
                | EdgeSubtype::List
                | EdgeSubtype::Merge
                | EdgeSubtype::Variable
                | EdgeSubtype::Config
        )
    }
}

/// Modifier carried by a Reference node's outgoing edges (spec §4.9): which facet
/// of the referenced note the edge exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    Note,
    Folder,
    Property,
    None,
}

/// An edge's produced content: a bare string, or a name→string map for multi-field
/// edges (spec §3, "payload (string | map)").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Fields(HashMap<String, String>),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Fields(_) => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Payload::Fields(map) => map.get(name).map(String::as_str),
            Payload::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: ObjectId,
    pub text: String,
    pub source: ObjectId,
    pub target: ObjectId,
    pub subtype: EdgeSubtype,
    pub modifier: Modifier,
    /// Groups the edge crosses entering its target, innermost last.
    pub crossing_in_groups: Vec<ObjectId>,
    /// Groups the edge crosses leaving its source, innermost last.
    pub crossing_out_groups: Vec<ObjectId>,
    /// True when source and target share identical enclosing-group sets: the edge
    /// does not cross any group boundary and is excluded from dependency lists
    /// (spec §4.5, "reflexive").
    pub is_reflexive: bool,
    /// Set by the source on completion (spec §3, "write-once per iteration").
    pub payload: Option<Payload>,
    /// Present only for edges that carry chat history.
    pub messages: Option<Vec<Message>>,
    /// When true, an edge that would not otherwise carry messages still does
    /// (used by indirect-edge message inheritance, spec §4.7 step 2).
    pub add_messages: bool,
    pub status: Status,
}

impl Edge {
    pub fn new(
        id: ObjectId,
        text: impl Into<String>,
        source: ObjectId,
        target: ObjectId,
        subtype: EdgeSubtype,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            source,
            target,
            subtype,
            modifier: Modifier::None,
            crossing_in_groups: Vec::new(),
            crossing_out_groups: Vec::new(),
            is_reflexive: false,
            payload: None,
            messages: None,
            add_messages: false,
            status: Status::Pending,
        }
    }

    /// Loads the edge on source completion (spec §4.5): sets `content` and, when
    /// the subtype requires it or `add_messages` is set, a snapshot of `messages`.
    pub fn load(&mut self, payload: Payload, source_messages: Option<Vec<Message>>) {
        self.payload = Some(payload);
        if self.subtype.always_carries_messages() || self.add_messages {
            self.messages = source_messages;
        }
        self.status = Status::Complete;
    }

    pub fn reject(&mut self) {
        self.status = Status::Rejected;
    }

    /// Clears the payload; used by group reset (spec §4.6) for edges whose target
    /// lies outside the group being iterated.
    pub fn reset(&mut self) {
        self.payload = None;
        self.messages = None;
        self.status = Status::Pending;
    }
}
