//! Structural validation (spec §4.1, §4.4).
//!
//! Runs once after classification and before any behavior executes. A single
//! failure is fatal: the offending vertex is marked `Error` and the run aborts
//! (spec §4.1, "Any failure marks the offending vertex Error and stops the run;
//! one error is fatal").

use crate::edge::EdgeSubtype;
use crate::graph::Graph;
use crate::ids::ObjectId;
use std::collections::{HashMap, HashSet};

/// A single structural validation failure, attributed to the vertex it should be
/// surfaced on (spec §4.1).
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub vertex: ObjectId,
    pub message: String,
}

impl ValidationError {
    fn new(vertex: ObjectId, message: impl Into<String>) -> Self {
        Self {
            vertex,
            message: message.into(),
        }
    }
}

/// Runs every structural check of spec §4.1 in order, short-circuiting on the
/// first category that finds any errors (each category's errors are collected
/// together, but we don't run e.g. the DAG check against a graph whose enclosure
/// is already known to be broken).
pub fn validate(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = check_overlap_enclosure(graph);
    if !errors.is_empty() {
        return errors;
    }

    errors.extend(check_exit_and_reenter(graph));
    errors.extend(check_group_outgoing_subtypes(graph));
    errors.extend(check_single_list_incoming(graph));
    errors.extend(check_dag(graph));
    errors.extend(check_duplicate_unconditional_variables(graph));
    errors
}

/// Every pair of vertices must either be disjoint or related by full enclosure
/// (spec §3, "no two vertices may overlap without enclosure").
fn check_overlap_enclosure(graph: &Graph) -> Vec<ValidationError> {
    let mut rects: Vec<(ObjectId, crate::graph::Rect)> = graph
        .nodes
        .values()
        .map(|n| (n.id.clone(), n.rect))
        .chain(graph.groups.values().map(|g| (g.id.clone(), g.rect)))
        .collect();
    rects.sort_by(|a, b| a.0.cmp(&b.0));

    let mut errors = Vec::new();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            let (id_a, rect_a) = &rects[i];
            let (id_b, rect_b) = &rects[j];
            if !rect_a.intersects(rect_b) {
                continue;
            }
            if rect_a.encloses(rect_b) || rect_b.encloses(rect_a) {
                continue;
            }
            errors.push(ValidationError::new(
                id_a.clone(),
                format!("overlaps '{}' without enclosure", id_b),
            ));
        }
    }
    errors
}

/// No path may leave a group and re-enter it (spec §3, "would deadlock"). For each
/// group, DFS forward from its members tracking whether the path has left the
/// group along the way.
fn check_exit_and_reenter(graph: &Graph) -> Vec<ValidationError> {
    let adjacency = forward_adjacency(graph);
    let mut errors = Vec::new();

    for group in graph.groups.values() {
        let members: HashSet<&ObjectId> = group.members.iter().collect();
        if members.is_empty() {
            continue;
        }
        let mut visited: HashSet<(ObjectId, bool)> = HashSet::new();
        for start in &group.members {
            if dfs_exit_reenter(start, false, &members, &adjacency, &mut visited) {
                errors.push(ValidationError::new(
                    group.id.clone(),
                    format!("a path exits and re-enters group '{}'", group.id),
                ));
                break;
            }
        }
    }
    errors
}

fn dfs_exit_reenter(
    current: &ObjectId,
    has_left: bool,
    members: &HashSet<&ObjectId>,
    adjacency: &HashMap<ObjectId, Vec<ObjectId>>,
    visited: &mut HashSet<(ObjectId, bool)>,
) -> bool {
    let key = (current.clone(), has_left);
    if visited.contains(&key) {
        return false;
    }
    visited.insert(key);

    let Some(neighbors) = adjacency.get(current) else {
        return false;
    };
    for next in neighbors {
        let next_has_left = has_left || !members.contains(next);
        if next_has_left && members.contains(next) {
            return true;
        }
        if dfs_exit_reenter(next, next_has_left, members, adjacency, visited) {
            return true;
        }
    }
    false
}

/// Groups may only have outgoing edges of the list subtype (spec §3).
fn check_group_outgoing_subtypes(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for group in graph.groups.values() {
        for edge_id in &group.outgoing_edges {
            if let Some(edge) = graph.edges.get(edge_id) {
                if edge.subtype != EdgeSubtype::List {
                    errors.push(ValidationError::new(
                        group.id.clone(),
                        format!(
                            "group has an illegal outgoing edge subtype (only List is allowed): {:?}",
                            edge.subtype
                        ),
                    ));
                }
            }
        }
    }
    errors
}

/// At most one incoming `List` edge per node (spec §4.1).
fn check_single_list_incoming(graph: &Graph) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for node in graph.nodes.values() {
        let count = node
            .incoming_edges
            .iter()
            .filter_map(|id| graph.edges.get(id))
            .filter(|e| e.subtype == EdgeSubtype::List)
            .count();
        if count > 1 {
            errors.push(ValidationError::new(
                node.id.clone(),
                format!("node has {} incoming List edges, at most one is allowed", count),
            ));
        }
    }
    errors
}

/// Three-color DFS over the vertex dependency graph (spec §4.4). Group↔member
/// edges are excluded (they're recorded as ordinary dependencies but don't form
/// part of the edge-based adjacency this check walks); only edge-carried
/// vertex→vertex dependencies are checked for cycles.
fn check_dag(graph: &Graph) -> Vec<ValidationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        Unvisited,
        Visiting,
        Visited,
    }

    let adjacency = forward_adjacency(graph);
    let mut colors: HashMap<ObjectId, Color> = graph
        .vertex_ids()
        .into_iter()
        .map(|id| (id, Color::Unvisited))
        .collect();
    let mut errors = Vec::new();

    fn visit(
        id: &ObjectId,
        adjacency: &HashMap<ObjectId, Vec<ObjectId>>,
        colors: &mut HashMap<ObjectId, Color>,
        errors: &mut Vec<ValidationError>,
    ) {
        colors.insert(id.clone(), Color::Visiting);
        if let Some(neighbors) = adjacency.get(id) {
            for next in neighbors {
                match colors.get(next).copied().unwrap_or(Color::Unvisited) {
                    Color::Visiting => {
                        errors.push(ValidationError::new(
                            id.clone(),
                            format!("Cycle detected involving '{}' -> '{}'", id, next),
                        ));
                    }
                    Color::Unvisited => visit(next, adjacency, colors, errors),
                    Color::Visited => {}
                }
            }
        }
        colors.insert(id.clone(), Color::Visited);
    }

    let ids = graph.vertex_ids();
    for id in &ids {
        if colors.get(id).copied().unwrap_or(Color::Unvisited) == Color::Unvisited {
            visit(id, &adjacency, &mut colors, &mut errors);
        }
    }
    errors
}

/// Duplicate variable definition is classified Structural (spec §7: "surfaced
/// before any behavior executes"), not just the runtime guard
/// `DependencyList::resolve` already enforces once the scheduler is running.
/// A same-named cluster is only runtime-resolvable when its members are
/// mutually exclusive (e.g. distinct branches of a Choice node, where the
/// loser is rejected before it ever writes); when two or more members are
/// each reachable *unconditionally* — with no Choice edge anywhere upstream
/// that could reject them — the conflict is guaranteed to happen on every
/// run and is rejected here instead of waiting for a live LLM call to prove
/// it.
fn check_duplicate_unconditional_variables(graph: &Graph) -> Vec<ValidationError> {
    let mut by_target_name: HashMap<(ObjectId, String), Vec<&crate::edge::Edge>> = HashMap::new();
    for edge in graph.edges.values() {
        if edge.is_reflexive || edge.text.is_empty() {
            continue;
        }
        if !matches!(
            edge.subtype,
            EdgeSubtype::Variable | EdgeSubtype::Field | EdgeSubtype::Category
        ) {
            continue;
        }
        by_target_name
            .entry((edge.target.clone(), edge.text.clone()))
            .or_default()
            .push(edge);
    }

    let mut memo: HashMap<ObjectId, bool> = HashMap::new();
    let mut in_progress: HashSet<ObjectId> = HashSet::new();
    let mut errors = Vec::new();

    let mut targets: Vec<(ObjectId, String)> = by_target_name.keys().cloned().collect();
    targets.sort();
    for key in targets {
        let group_edges = &by_target_name[&key];
        if group_edges.len() < 2 {
            continue;
        }
        let mut unconditional: Vec<ObjectId> = group_edges
            .iter()
            .filter(|e| is_unconditionally_reachable(graph, &e.source, &mut memo, &mut in_progress))
            .map(|e| e.source.clone())
            .collect();
        unconditional.sort();
        unconditional.dedup();
        if unconditional.len() > 1 {
            let (target, name) = key;
            errors.push(ValidationError::new(
                target,
                format!(
                    "duplicate variable definition: '{}' is written unconditionally by {}",
                    name,
                    unconditional
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }
    errors
}

/// A vertex is unconditionally reachable if it has no incoming edges (a root:
/// Floating, or a Call/Content whose only inputs are static) or if every one
/// of its non-reflexive incoming edges is a non-Choice edge from an
/// unconditionally reachable source. A vertex gated behind any Choice edge,
/// anywhere in its ancestry, might be rejected and so isn't unconditional.
/// Cycles (already reported by `check_dag`) default to `false` rather than
/// recursing forever.
fn is_unconditionally_reachable(
    graph: &Graph,
    id: &ObjectId,
    memo: &mut HashMap<ObjectId, bool>,
    in_progress: &mut HashSet<ObjectId>,
) -> bool {
    if let Some(&cached) = memo.get(id) {
        return cached;
    }
    if in_progress.contains(id) {
        return false;
    }
    in_progress.insert(id.clone());

    let incoming: Vec<&crate::edge::Edge> = graph
        .edges
        .values()
        .filter(|e| &e.target == id && !e.is_reflexive)
        .collect();

    let result = if incoming.is_empty() {
        true
    } else {
        incoming.iter().all(|e| {
            e.subtype != EdgeSubtype::Choice
                && is_unconditionally_reachable(graph, &e.source, memo, in_progress)
        })
    };

    in_progress.remove(id);
    memo.insert(id.clone(), result);
    result
}

/// Builds a vertex→vertex forward adjacency map from non-reflexive edges only
/// (reflexive edges are loop back-edges, excluded from the dependency graph).
fn forward_adjacency(graph: &Graph) -> HashMap<ObjectId, Vec<ObjectId>> {
    let mut adjacency: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    for edge in graph.edges.values() {
        if edge.is_reflexive {
            continue;
        }
        adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
    }
    adjacency
}
