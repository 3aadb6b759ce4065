//! The graph arena and canvas-derived type classification (spec §3, §4.1).
//!
//! The graph is modeled as a flat lookup table keyed by [`ObjectId`]: nodes, edges,
//! and groups all name their neighbors by id rather than holding direct references
//! (spec §9, "graph references"). This avoids cyclic ownership between a node and
//! the edges/groups that mention it.

use crate::dependency::DependencyList;
use crate::edge::{Edge, EdgeSubtype, Modifier};
use crate::group::{Group, GroupSubtype};
use crate::ids::ObjectId;
use crate::node::call::{CallNode, CallVariant};
use crate::node::content::ContentNode;
use crate::node::floating::{self, FloatingNode};
use crate::node::formatter::FormatterNode;
use crate::node::http::HttpNode;
use crate::node::reference_node::{ReferenceMode, ReferenceNode};
use crate::node::{NodeKind, NodeObject};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned rectangle in canvas coordinates, used for the enclosure/overlap
/// checks of spec §4.1 and the For-Each clone machinery's geometry inheritance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Whether `self` fully encloses `other` (spec §3, "a group rectangle must
    /// enclose every member's rectangle").
    pub fn encloses(&self, other: &Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// Whether `self` and `other` share any interior area.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Raw vertex geometry and label as read off the canvas (the canvas file reader
/// itself is out of scope, spec §1). Deserializable so a host or test fixture can
/// hand the engine a plain JSON canvas dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVertex {
    pub id: ObjectId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub text: String,
    pub color: Option<String>,
}

impl RawVertex {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEdge {
    pub id: ObjectId,
    pub source: ObjectId,
    pub target: ObjectId,
    pub label: String,
    pub color: Option<String>,
}

/// The two-pass type decision of spec §4.1: a vertex's prefix character and color
/// suggest an *indicated* type before the loader commits to a concrete subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatedType {
    List,
    While,
    Repeat,
    Call,
    Content,
    Reference,
    Http,
    Formatter,
    Floating,
    Basic,
    NonLogic,
}

/// Derives the indicated type from a vertex's first label character, then
/// color, then label-numeric (spec.md: "first label character (prefix
/// map)... then from node color, then from label-numeric (Repeat)"). The
/// color check must run before the digit-only fallback: a colored Content
/// node whose body text happens to be purely numeric (e.g. the literal text
/// `"42"`) is still a Content node, not a Repeat group.
pub fn indicate_type(raw: &RawVertex) -> IndicatedType {
    let trimmed = raw.text.trim_start();
    match trimmed.chars().next() {
        Some('<') => return IndicatedType::List,
        Some('?') => return IndicatedType::While,
        Some('[') => return IndicatedType::Floating,
        Some('>') => return IndicatedType::Reference,
        Some('~') => return IndicatedType::Http,
        Some('"') => return IndicatedType::Formatter,
        _ => {}
    }
    match raw.color.as_deref() {
        Some("1") => return IndicatedType::Call,
        Some("2") => return IndicatedType::Content,
        Some("3") => return IndicatedType::Reference,
        Some("4") => return IndicatedType::Http,
        Some("5") => return IndicatedType::Formatter,
        _ => {}
    }
    if trimmed
        .chars()
        .take_while(|c| !c.is_whitespace())
        .all(|c| c.is_ascii_digit())
        && !trimmed.is_empty()
    {
        return IndicatedType::Repeat;
    }
    IndicatedType::Basic
}

/// The concrete kind a vertex resolves to; unresolved combinations are a
/// structural `Error` on the vertex (spec §4.1).
#[derive(Debug, Clone)]
pub enum FinalType {
    Node(NodeKind),
    Group(GroupSubtype),
    Error(String),
}

/// Extracts the leading run of ASCII digits from a vertex's label, used to find the
/// positive integer every Repeat/While/List group must carry (spec §3).
pub fn parse_label_number(text: &str) -> Option<u32> {
    let trimmed = text.trim_start_matches(|c: char| !c.is_ascii_digit() && c != '\n');
    let digits: String = trimmed
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Resolves an indicated type (plus, for loop groups, a positive integer label) to
/// a concrete final type (spec §4.1, "Final type").
pub fn finalize_type(indicated: IndicatedType, label_number: Option<u32>) -> FinalType {
    match indicated {
        IndicatedType::List => match label_number {
            Some(n) if n > 0 => FinalType::Group(GroupSubtype::ForEach { versions: n }),
            _ => FinalType::Error("list group missing positive integer label".to_string()),
        },
        IndicatedType::While => match label_number {
            Some(n) if n > 0 => FinalType::Group(GroupSubtype::While { max_loops: n }),
            _ => FinalType::Error("while group missing positive integer label".to_string()),
        },
        IndicatedType::Repeat => match label_number {
            Some(n) if n > 0 => FinalType::Group(GroupSubtype::Repeat { max_loops: n }),
            _ => FinalType::Error("repeat group missing positive integer label".to_string()),
        },
        IndicatedType::Call => FinalType::Node(NodeKind::Call(CallNode::new(CallVariant::Standard))),
        IndicatedType::Content => FinalType::Node(NodeKind::Content(ContentNode)),
        IndicatedType::Reference => {
            FinalType::Node(NodeKind::Reference(ReferenceNode::new(ReferenceMode::Read)))
        }
        IndicatedType::Http => FinalType::Node(NodeKind::Http(HttpNode)),
        IndicatedType::Formatter => FinalType::Node(NodeKind::Formatter(FormatterNode)),
        IndicatedType::Floating => FinalType::Node(NodeKind::Floating(FloatingNode::default())),
        IndicatedType::Basic => FinalType::Group(GroupSubtype::Basic),
        IndicatedType::NonLogic => {
            FinalType::Node(NodeKind::Content(ContentNode))
        }
    }
}

/// The flat object table for one run: every node, edge, and group, keyed by id.
pub struct Graph {
    pub nodes: HashMap<ObjectId, NodeObject>,
    pub edges: HashMap<ObjectId, Edge>,
    pub groups: HashMap<ObjectId, Group>,
    pub statuses: HashMap<ObjectId, Status>,
    pub dependencies: HashMap<ObjectId, DependencyList>,
    pub warnings: HashMap<ObjectId, Vec<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            groups: HashMap::new(),
            statuses: HashMap::new(),
            dependencies: HashMap::new(),
            warnings: HashMap::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeObject) {
        self.statuses.insert(node.id.clone(), Status::Pending);
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.statuses.insert(edge.id.clone(), Status::Pending);
        self.edges.insert(edge.id.clone(), edge);
    }

    pub fn add_group(&mut self, group: Group) {
        self.statuses.insert(group.id.clone(), Status::Pending);
        self.groups.insert(group.id.clone(), group);
    }

    pub fn status_of(&self, id: &ObjectId) -> Status {
        self.statuses.get(id).copied().unwrap_or(Status::Pending)
    }

    pub fn set_status(&mut self, id: &ObjectId, status: Status) {
        self.statuses.insert(id.clone(), status);
    }

    pub fn push_warning(&mut self, id: &ObjectId, msg: String) {
        self.warnings.entry(id.clone()).or_default().push(msg);
    }

    /// All vertex ids (nodes and groups), for DAG traversal and validation passes.
    pub fn vertex_ids(&self) -> Vec<ObjectId> {
        self.nodes
            .keys()
            .chain(self.groups.keys())
            .cloned()
            .collect()
    }

    /// Builds the dependency list for every node and group, per spec §4.3:
    /// every non-reflexive incoming edge, plus every non-reflexive incoming edge
    /// of every enclosing group, plus (for groups) each member.
    ///
    /// The scheduler does not drive a group's own `Pending -> Executing`
    /// transition through this list (that only needs the group's incoming edges,
    /// spec §4.6 "on first activation"); it uses [`crate::group::Group::iteration_decision`]
    /// for the member-gated completion/re-drive decision instead, since a single
    /// rejected member must not reject the whole group the way [`Dependency`]
    /// resolution would. This list still documents the conceptual dependency of
    /// spec §4.3 and is what `cluster_dependency` mutates for Choose-node clusters.
    pub fn compute_dependencies(&mut self) {
        let mut deps: HashMap<ObjectId, DependencyList> = HashMap::new();

        for (id, node) in &self.nodes {
            let mut list = DependencyList::new();
            self.push_vertex_edge_deps(&mut list, &node.incoming_edges);
            for group_id in &node.enclosing_groups {
                if let Some(group) = self.groups.get(group_id) {
                    self.push_vertex_edge_deps(&mut list, &group.incoming_edges);
                }
            }
            deps.insert(id.clone(), list);
        }

        for (id, group) in &self.groups {
            let mut list = DependencyList::new();
            self.push_vertex_edge_deps(&mut list, &group.incoming_edges);
            for member in &group.members {
                list.push_single(member.clone());
            }
            deps.insert(id.clone(), list);
        }

        self.dependencies = deps;
    }

    /// A vertex depends on its incoming edges themselves, not on their source
    /// vertices (spec §4.3, "vertex dependencies come from ... every non-reflexive
    /// incoming edge"): the edge's own status tracks whether *that particular*
    /// branch was loaded or rejected, which a shared source vertex's status cannot
    /// distinguish when the source fans out to several differently-routed edges
    /// (e.g. a Choose node's outgoing `Choice` edges).
    fn push_vertex_edge_deps(&self, list: &mut DependencyList, edge_ids: &[ObjectId]) {
        for edge_id in edge_ids {
            if let Some(edge) = self.edges.get(edge_id) {
                if !edge.is_reflexive {
                    list.push_single(edge_id.clone());
                }
            }
        }
    }

    /// Groups a list of edge-level dependencies into disjunctive clusters by the
    /// variable name their producing edges carry, implementing "same variable name
    /// supplied by distinct branches of a Choose node" (spec §4.3). Call this after
    /// [`Self::compute_dependencies`] when the loader has identified which incoming
    /// edges share a name.
    pub fn cluster_dependency(&mut self, target: &ObjectId, edge_ids: &[ObjectId]) {
        let ids: Vec<ObjectId> = edge_ids
            .iter()
            .filter(|e| self.edges.get(*e).map(|edge| !edge.is_reflexive).unwrap_or(false))
            .cloned()
            .collect();
        if ids.len() < 2 {
            return;
        }
        let list = self.dependencies.entry(target.clone()).or_default();
        list.entries.retain(|dep| match dep {
            crate::dependency::Dependency::Single(id) => !ids.contains(id),
            crate::dependency::Dependency::Cluster(_) => true,
        });
        list.push_cluster(ids);
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect { x, y, w, h }
    }

    #[test]
    fn encloses_is_true_only_when_every_edge_fits_inside() {
        let outer = rect(0.0, 0.0, 100.0, 100.0);
        assert!(outer.encloses(&rect(10.0, 10.0, 50.0, 50.0)));
        assert!(outer.encloses(&outer));
        assert!(!outer.encloses(&rect(-1.0, 10.0, 50.0, 50.0)));
        assert!(!outer.encloses(&rect(10.0, 10.0, 200.0, 50.0)));
    }

    #[test]
    fn intersects_requires_shared_interior_not_just_touching_edges() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        assert!(a.intersects(&rect(50.0, 50.0, 100.0, 100.0)));
        assert!(!a.intersects(&rect(100.0, 0.0, 100.0, 100.0)));
        assert!(!a.intersects(&rect(200.0, 200.0, 10.0, 10.0)));
    }

    #[test]
    fn right_bottom_and_area_follow_from_origin_and_size() {
        let r = rect(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.bottom(), 60.0);
        assert_eq!(r.area(), 1200.0);
    }

    fn vertex(text: &str, color: Option<&str>) -> RawVertex {
        RawVertex {
            id: ObjectId::new("v"),
            x: 0.0,
            y: 0.0,
            w: 100.0,
            h: 100.0,
            text: text.to_string(),
            color: color.map(|s| s.to_string()),
        }
    }

    #[test]
    fn indicate_type_checks_prefix_before_color_before_label_numeric() {
        assert_eq!(indicate_type(&vertex("<3", Some("2"))), IndicatedType::List);
        assert_eq!(indicate_type(&vertex("?5", None)), IndicatedType::While);
        assert_eq!(indicate_type(&vertex("~template", None)), IndicatedType::Http);
        assert_eq!(indicate_type(&vertex("plain call", Some("1"))), IndicatedType::Call);
        assert_eq!(indicate_type(&vertex("plain body", Some("2"))), IndicatedType::Content);
    }

    #[test]
    fn a_purely_numeric_content_body_is_not_misread_as_a_repeat_group() {
        assert_eq!(indicate_type(&vertex("42", Some("2"))), IndicatedType::Content);
        assert_eq!(indicate_type(&vertex("3", None)), IndicatedType::Repeat);
    }

    #[test]
    fn uncolored_non_numeric_text_falls_back_to_basic() {
        assert_eq!(indicate_type(&vertex("just some notes", None)), IndicatedType::Basic);
    }

    #[test]
    fn parse_label_number_reads_the_leading_digit_run() {
        assert_eq!(parse_label_number("3"), Some(3));
        assert_eq!(parse_label_number("12 times"), Some(12));
        assert_eq!(parse_label_number("no digits here"), None);
        assert_eq!(parse_label_number(""), None);
    }
}

/// Parses a floating node's configuration out of its raw text, for use by the
/// loader once a vertex has been classified as `Floating` (spec §4.9).
pub fn materialize_floating(node: &mut NodeObject) {
    if let NodeKind::Floating(_) = &node.kind {
        let parsed = floating::parse(&node.text);
        node.kind = NodeKind::Floating(parsed);
    }
}
