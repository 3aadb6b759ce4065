//! Builds a [`Graph`] from raw canvas vertices/edges (spec §4.1).
//!
//! The canvas file reader itself is out of scope (spec §1); what lands here is
//! already a flat list of vertex/edge geometry and label text. This module performs
//! the two-pass type decision, computes enclosure/crossing/reflexivity, and wires
//! every [`crate::dependency::DependencyList`] before validation runs.

use crate::edge::{Edge, EdgeSubtype, Modifier};
use crate::graph::{
    finalize_type, indicate_type, parse_label_number, FinalType, Graph, RawEdge, RawVertex, Rect,
};
use crate::group::{Group, GroupSubtype};
use crate::ids::ObjectId;
use crate::node::{NodeKind, NodeObject};
use std::collections::HashMap;

/// Infers an edge's subtype and name/modifier from its label text, then its color
/// (spec §4.5; the exact prefix/color vocabulary is an implementation decision —
/// see `DESIGN.md` for the mapping chosen here, analogous to the vertex prefix map
/// of spec §4.1).
fn classify_edge(raw: &RawEdge) -> (EdgeSubtype, Modifier, String) {
    let label = raw.label.trim();

    if let Some(rest) = label.strip_prefix("$") {
        return (EdgeSubtype::Config, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('?') {
        return (EdgeSubtype::Choice, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('!') {
        return (
            EdgeSubtype::SystemMessage,
            Modifier::None,
            rest.trim().to_string(),
        );
    }
    if let Some(rest) = label.strip_prefix('~') {
        return (
            EdgeSubtype::ChatResponse,
            Modifier::None,
            rest.trim().to_string(),
        );
    }
    if let Some(rest) = label.strip_prefix('*') {
        return (EdgeSubtype::Logging, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix("[[") {
        let name = rest.strip_suffix("]]").unwrap_or(rest);
        return (EdgeSubtype::Variable, Modifier::Note, name.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('/') {
        return (EdgeSubtype::Variable, Modifier::Folder, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('^') {
        return (
            EdgeSubtype::Variable,
            Modifier::Property,
            rest.trim().to_string(),
        );
    }
    if let Some(rest) = label.strip_prefix('#') {
        return (EdgeSubtype::Field, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('%') {
        return (EdgeSubtype::Category, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('<') {
        return (EdgeSubtype::List, Modifier::None, rest.trim().to_string());
    }
    if let Some(rest) = label.strip_prefix('&') {
        return (EdgeSubtype::Merge, Modifier::None, rest.trim().to_string());
    }

    match raw.color.as_deref() {
        Some("1") => (EdgeSubtype::Chat, Modifier::None, String::new()),
        Some("2") => (EdgeSubtype::SystemMessage, Modifier::None, String::new()),
        Some("3") => (EdgeSubtype::Logging, Modifier::None, String::new()),
        _ if label.is_empty() => (EdgeSubtype::Write, Modifier::None, String::new()),
        _ => (EdgeSubtype::Variable, Modifier::None, label.to_string()),
    }
}

/// Builds the full [`Graph`] from raw canvas data. Returns the graph plus any
/// structural errors already found during classification (missing labels on loop
/// groups); callers should still run [`crate::validate::validate`] before starting
/// execution.
pub fn load(vertices: &[RawVertex], edges: &[RawEdge]) -> (Graph, Vec<(ObjectId, String)>) {
    let mut graph = Graph::new();
    let mut classification_errors = Vec::new();
    let mut group_rects: Vec<(ObjectId, Rect)> = Vec::new();

    for raw in vertices {
        let indicated = indicate_type(raw);
        let label_number = parse_label_number(&raw.text);
        match finalize_type(indicated, label_number) {
            FinalType::Node(kind) => {
                let mut node = NodeObject::new(raw.id.clone(), raw.text.clone(), raw.rect(), kind);
                if let NodeKind::Floating(_) = &node.kind {
                    crate::graph::materialize_floating(&mut node);
                }
                graph.add_node(node);
            }
            FinalType::Group(subtype) => {
                group_rects.push((raw.id.clone(), raw.rect()));
                graph.add_group(Group::new(raw.id.clone(), raw.rect(), subtype));
            }
            FinalType::Error(msg) => {
                classification_errors.push((raw.id.clone(), msg));
                // Still materialize a placeholder content node so downstream
                // lookups don't panic; it starts `Error` via validation.
                graph.add_node(NodeObject::new(
                    raw.id.clone(),
                    raw.text.clone(),
                    raw.rect(),
                    NodeKind::Content(crate::node::content::ContentNode),
                ));
            }
        }
    }

    assign_enclosing_groups(&mut graph, &group_rects);
    assign_edges(&mut graph, edges);
    graph.compute_dependencies();
    cluster_same_named_incoming(&mut graph);

    (graph, classification_errors)
}

/// Sorts candidate enclosing groups innermost-first (smallest area first) for a
/// vertex at `rect`, keeping only groups that geometrically enclose it.
fn enclosing_groups_for(rect: &Rect, group_rects: &[(ObjectId, Rect)], self_id: &ObjectId) -> Vec<ObjectId> {
    let mut matches: Vec<(ObjectId, f64)> = group_rects
        .iter()
        .filter(|(id, grect)| id != self_id && grect.encloses(rect))
        .map(|(id, grect)| (id.clone(), grect.area()))
        .collect();
    matches.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    matches.into_iter().map(|(id, _)| id).collect()
}

fn assign_enclosing_groups(graph: &mut Graph, group_rects: &[(ObjectId, Rect)]) {
    let node_updates: Vec<(ObjectId, Vec<ObjectId>)> = graph
        .nodes
        .values()
        .map(|n| (n.id.clone(), enclosing_groups_for(&n.rect, group_rects, &n.id)))
        .collect();
    for (id, groups) in node_updates {
        if let Some(n) = graph.nodes.get_mut(&id) {
            n.enclosing_groups = groups;
        }
    }

    let group_updates: Vec<(ObjectId, Vec<ObjectId>)> = graph
        .groups
        .values()
        .map(|g| (g.id.clone(), enclosing_groups_for(&g.rect, group_rects, &g.id)))
        .collect();
    for (id, groups) in group_updates {
        if let Some(g) = graph.groups.get_mut(&id) {
            g.enclosing_groups = groups;
        }
    }

    // A group's members are every vertex whose innermost enclosing group is it.
    let mut members: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    for n in graph.nodes.values() {
        if let Some(innermost) = n.enclosing_groups.first() {
            members.entry(innermost.clone()).or_default().push(n.id.clone());
        }
    }
    for g in graph.groups.values() {
        if let Some(innermost) = g.enclosing_groups.first() {
            members.entry(innermost.clone()).or_default().push(g.id.clone());
        }
    }
    for (group_id, member_ids) in members {
        if let Some(group) = graph.groups.get_mut(&group_id) {
            group.members = member_ids;
        }
    }
}

fn assign_edges(graph: &mut Graph, edges: &[RawEdge]) {
    for raw in edges {
        let (subtype, modifier, name) = classify_edge(raw);
        let source_groups = vertex_enclosing_groups(graph, &raw.source);
        let target_groups = vertex_enclosing_groups(graph, &raw.target);
        // A reflexive edge doesn't cross any group boundary (spec §9 glossary), so
        // two top-level vertices with no enclosing group at all are never
        // reflexive to each other. This is still only a *candidate* flag: within a
        // loop body two members can have an ordinary forward edge between them as
        // well as the genuine back-edge, both sharing the same enclosing-group set;
        // `resolve_reflexive_back_edges` below narrows candidates down to the edges
        // that actually close a cycle.
        let is_reflexive_candidate = !source_groups.is_empty() && source_groups == target_groups;

        let crossing_out: Vec<ObjectId> = source_groups
            .iter()
            .filter(|g| !target_groups.contains(g))
            .cloned()
            .collect();
        let crossing_in: Vec<ObjectId> = target_groups
            .iter()
            .filter(|g| !source_groups.contains(g))
            .cloned()
            .collect();

        let mut edge = Edge::new(raw.id.clone(), name, raw.source.clone(), raw.target.clone(), subtype);
        edge.modifier = modifier;
        edge.is_reflexive = is_reflexive_candidate;
        edge.crossing_out_groups = crossing_out;
        edge.crossing_in_groups = crossing_in;

        if let Some(node) = graph.nodes.get_mut(&raw.source) {
            node.outgoing_edges.push(raw.id.clone());
        }
        if let Some(group) = graph.groups.get_mut(&raw.source) {
            group.outgoing_edges.push(raw.id.clone());
        }
        if let Some(node) = graph.nodes.get_mut(&raw.target) {
            node.incoming_edges.push(raw.id.clone());
        }

        graph.add_edge(edge);
    }

    resolve_reflexive_back_edges(graph);

    // Now that every edge's final `is_reflexive` is settled, commit each group's
    // incoming edges into the reflexive/non-reflexive buckets the scheduler and
    // `Group::iteration_decision` read.
    let group_ids: Vec<ObjectId> = graph.groups.keys().cloned().collect();
    for group_id in group_ids {
        let incoming: Vec<ObjectId> = graph
            .edges
            .values()
            .filter(|e| e.target == group_id)
            .map(|e| e.id.clone())
            .collect();
        let group = graph.groups.get_mut(&group_id).expect("group exists");
        for edge_id in incoming {
            if graph.edges.get(&edge_id).map(|e| e.is_reflexive).unwrap_or(false) {
                group.reflexive_incoming_edges.push(edge_id);
            } else {
                group.incoming_edges.push(edge_id);
            }
        }
    }
}

/// Among edges whose endpoints share an identical non-empty enclosing-group set
/// (candidates for "reflexive"), keeps only the ones that actually close a cycle —
/// i.e. a genuine loop back-edge (spec §9 glossary, "used as loop back-edge") —
/// reflexive. A candidate edge that instead runs forward between two group
/// members (e.g. a Call feeding its sibling Content within the same loop body) is
/// demoted to an ordinary dependency, identified the same way `validate::check_dag`
/// finds cycles: a three-color DFS restricted to the candidate subgraph, where an
/// edge into a `Visiting` (gray) vertex is the back-edge.
fn resolve_reflexive_back_edges(graph: &mut Graph) {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let candidates: Vec<(ObjectId, ObjectId, ObjectId)> = graph
        .edges
        .values()
        .filter(|e| e.is_reflexive)
        .map(|e| (e.id.clone(), e.source.clone(), e.target.clone()))
        .collect();
    if candidates.is_empty() {
        return;
    }

    let mut adjacency: HashMap<ObjectId, Vec<(ObjectId, ObjectId)>> = HashMap::new();
    for (edge_id, source, target) in &candidates {
        adjacency.entry(source.clone()).or_default().push((target.clone(), edge_id.clone()));
    }

    fn visit(
        node: &ObjectId,
        adjacency: &HashMap<ObjectId, Vec<(ObjectId, ObjectId)>>,
        colors: &mut HashMap<ObjectId, Color>,
        back_edges: &mut std::collections::HashSet<ObjectId>,
    ) {
        colors.insert(node.clone(), Color::Gray);
        if let Some(neighbors) = adjacency.get(node) {
            for (target, edge_id) in neighbors {
                match colors.get(target).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        back_edges.insert(edge_id.clone());
                    }
                    Color::White => visit(target, adjacency, colors, back_edges),
                    Color::Black => {}
                }
            }
        }
        colors.insert(node.clone(), Color::Black);
    }

    let mut colors: HashMap<ObjectId, Color> = HashMap::new();
    let mut back_edges: std::collections::HashSet<ObjectId> = std::collections::HashSet::new();
    let mut starts: Vec<ObjectId> = adjacency.keys().cloned().collect();
    starts.sort();
    for start in starts {
        if colors.get(&start).copied().unwrap_or(Color::White) == Color::White {
            visit(&start, &adjacency, &mut colors, &mut back_edges);
        }
    }

    for (edge_id, _, _) in &candidates {
        let actually_reflexive = back_edges.contains(edge_id);
        if let Some(edge) = graph.edges.get_mut(edge_id) {
            edge.is_reflexive = actually_reflexive;
        }
    }
}

fn vertex_enclosing_groups(graph: &Graph, id: &ObjectId) -> Vec<ObjectId> {
    if let Some(n) = graph.nodes.get(id) {
        return n.enclosing_groups.clone();
    }
    if let Some(g) = graph.groups.get(id) {
        return g.enclosing_groups.clone();
    }
    Vec::new()
}

/// Expands every `ForEach(K)` group's template subgraph into `K` parallel clones
/// (spec §4.6: "on activation, the loader has already produced K cloned copies of
/// the subgraph with an index"). Runs after validation, against the authored
/// geometry, so clone ids never have to satisfy the overlap/enclosure checks of
/// spec §3 — only the single authored template does.
///
/// Edges crossing the template's boundary (an external source feeding a member,
/// or a member feeding something outside the group) are cloned right alongside
/// the purely internal ones, so every clone still receives its external inputs
/// and still produces its external outputs — only the endpoint that's a
/// template member gets remapped to the clone id.
///
/// Nested groups as ForEach members aren't cloned (an authored template is
/// expected to enclose plain nodes); a nested group member is left untouched and
/// shared across every clone.
pub fn materialize_foreach(graph: &mut Graph) {
    let group_ids: Vec<ObjectId> = graph.groups.keys().cloned().collect();
    let mut any_cloned = false;

    for group_id in group_ids {
        let (versions, template_members) = {
            let group = graph.groups.get(&group_id).expect("group exists");
            match group.subtype {
                GroupSubtype::ForEach { versions } if versions > 1 => {
                    (versions, group.members.clone())
                }
                _ => continue,
            }
        };

        if let Some(group) = graph.groups.get_mut(&group_id) {
            group.foreach_template = template_members.clone();
        }

        // Every edge touching the template on at least one end needs its own copy
        // per clone: edges wholly inside the template (e.g. a Call feeding its
        // sibling Content), and edges crossing the template boundary in either
        // direction (an external Floating/Call feeding a member, or a member
        // feeding something outside the group). Only the endpoint that's an
        // actual template member gets remapped to the clone id; an external
        // endpoint is left as-is so every clone still reads from (or writes to)
        // the same outside vertex.
        let boundary_edges: Vec<ObjectId> = graph
            .edges
            .values()
            .filter(|e| template_members.contains(&e.source) || template_members.contains(&e.target))
            .map(|e| e.id.clone())
            .collect();

        let mut all_members = template_members.clone();

        for idx in 1..(versions as usize) {
            let mut id_map: HashMap<ObjectId, ObjectId> = HashMap::new();
            for member in &template_members {
                let Some(template_node) = graph.nodes.get(member).cloned() else {
                    // Nested groups aren't cloned; shared across every index.
                    continue;
                };
                let clone_id = member.clone_id(idx);
                id_map.insert(member.clone(), clone_id.clone());

                let mut cloned = template_node;
                cloned.id = clone_id.clone();
                cloned.incoming_edges.clear();
                cloned.outgoing_edges.clear();
                graph.add_node(cloned);
                all_members.push(clone_id);
            }

            for edge_id in &boundary_edges {
                let Some(template_edge) = graph.edges.get(edge_id).cloned() else {
                    continue;
                };
                let new_source = id_map.get(&template_edge.source).cloned().unwrap_or(template_edge.source.clone());
                let new_target = id_map.get(&template_edge.target).cloned().unwrap_or(template_edge.target.clone());
                let new_edge_id = template_edge.id.clone_id(idx);

                let mut cloned_edge = template_edge;
                cloned_edge.id = new_edge_id.clone();
                cloned_edge.source = new_source.clone();
                cloned_edge.target = new_target.clone();
                cloned_edge.payload = None;
                cloned_edge.messages = None;

                if let Some(node) = graph.nodes.get_mut(&new_source) {
                    node.outgoing_edges.push(new_edge_id.clone());
                }
                if let Some(node) = graph.nodes.get_mut(&new_target) {
                    node.incoming_edges.push(new_edge_id.clone());
                }
                graph.add_edge(cloned_edge);
            }
        }

        if let Some(group) = graph.groups.get_mut(&group_id) {
            group.members = all_members;
        }
        any_cloned = true;
    }

    if any_cloned {
        graph.dependencies.clear();
        graph.compute_dependencies();
        cluster_same_named_incoming(graph);
    }
}

/// Groups same-named incoming `Variable`/`Field`/`Choice` edges on the same target
/// into a disjunctive dependency cluster (spec §4.3, "same variable name supplied
/// by distinct branches of a Choose node").
fn cluster_same_named_incoming(graph: &mut Graph) {
    let mut by_target_name: HashMap<(ObjectId, String), Vec<ObjectId>> = HashMap::new();
    for edge in graph.edges.values() {
        if edge.is_reflexive || edge.text.is_empty() {
            continue;
        }
        if !matches!(
            edge.subtype,
            EdgeSubtype::Variable | EdgeSubtype::Field | EdgeSubtype::Choice | EdgeSubtype::Category
        ) {
            continue;
        }
        by_target_name
            .entry((edge.target.clone(), edge.text.clone()))
            .or_default()
            .push(edge.id.clone());
    }

    for ((target, _name), edge_ids) in by_target_name {
        if edge_ids.len() > 1 {
            graph.cluster_dependency(&target, &edge_ids);
        }
    }
}
