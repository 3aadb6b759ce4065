//! The event-driven scheduler (spec §4.2, §4.6, §5).
//!
//! Execution proceeds in supersteps, mirroring the teacher's Pregel-style
//! executor: each round resolves every `Pending` vertex's dependencies, executes
//! every vertex that just became `Executing` concurrently (bounded by the LLM
//! concurrency limiter), applies their outputs atomically, then drives group
//! iteration before the next round. This keeps the "single logical scheduler"
//! invariant of spec §5 — all status transitions happen between rounds, never
//! while a behavior is suspended on I/O.

use crate::capabilities::Capabilities;
use crate::dependency::{DependencyList, Resolution};
use crate::edge::Payload;
use crate::group::{GroupSubtype, IterationDecision};
use crate::ids::ObjectId;
use crate::node::{ExecutionInput, ExecutionOutput, NodeKind};
use crate::reference::{Reference, SubstitutionContext};
use crate::run::{RunSettings, StopReason, Usage};
use crate::status::{Status, UpdateEvent};
use crate::graph::Graph;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct Scheduler {
    pub graph: Graph,
    caps: Arc<Capabilities>,
    settings: RunSettings,
    limiter: Arc<Semaphore>,
    stopped: bool,
    stop_reason: Option<StopReason>,
    stop_message: Option<String>,
    pub usage: Usage,
    pub output_text: HashMap<ObjectId, String>,
    pub executing_counts: HashMap<ObjectId, u32>,
    events: Vec<UpdateEvent>,
}

impl Scheduler {
    pub fn new(graph: Graph, caps: Arc<Capabilities>, settings: RunSettings) -> Self {
        let limiter = Arc::new(Semaphore::new(settings.p_limit.max(1)));
        Self {
            graph,
            caps,
            settings,
            limiter,
            stopped: false,
            stop_reason: None,
            stop_message: None,
            usage: Usage::default(),
            output_text: HashMap::new(),
            executing_counts: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Emits an `update(obj, status)` event and records it, but only when the
    /// status actually changes (spec §8, "no status is re-emitted without
    /// change").
    fn transition(&mut self, id: &ObjectId, status: Status, message: Option<String>) {
        if self.graph.status_of(id) == status {
            return;
        }
        self.graph.set_status(id, status);
        if status == Status::Executing {
            *self.executing_counts.entry(id.clone()).or_insert(0) += 1;
        }
        tracing::debug!(vertex = %id, ?status, "status transition");
        self.events.push(UpdateEvent::new(id.clone(), status, message));
    }

    fn fatal(&mut self, id: &ObjectId, message: String) {
        tracing::error!(vertex = %id, %message, "fatal error");
        self.transition(id, Status::Error, Some(message.clone()));
        self.stopped = true;
        self.stop_reason = Some(StopReason::Error);
        self.stop_message = Some(format!("{}: {}", id, message));
    }

    /// Runs the graph to completion (or until stopped), returning the terminal
    /// [`StopReason`] and an optional message (spec §6, `onFinish`).
    #[tracing::instrument(skip(self))]
    pub async fn drive(&mut self) -> (StopReason, Option<String>) {
        self.seed_floating();

        loop {
            if self.stopped {
                break;
            }

            let deps_progressed = self.evaluate_dependencies();
            if self.stopped {
                break;
            }
            let iter_progressed = self.process_group_iterations();

            let ready_nodes = self.collect_ready_nodes();
            if ready_nodes.is_empty() {
                if !deps_progressed && !iter_progressed {
                    break;
                }
                continue;
            }

            let outputs = self.execute_nodes(ready_nodes).await;
            self.apply_outputs(outputs);
        }

        if self.stopped {
            return (
                self.stop_reason.unwrap_or(StopReason::Error),
                self.stop_message.clone(),
            );
        }

        let any_error = self.graph.statuses.values().any(|s| *s == Status::Error);
        if any_error {
            (StopReason::Error, self.stop_message.clone())
        } else {
            (StopReason::Complete, None)
        }
    }

    /// Floating nodes are `Complete` at graph construction (spec §3, §4.9); seed
    /// them and propagate their constant value onto every outgoing edge before
    /// the first superstep.
    fn seed_floating(&mut self) {
        let floating_ids: Vec<(ObjectId, String, Vec<ObjectId>)> = self
            .graph
            .nodes
            .values()
            .filter_map(|n| match &n.kind {
                NodeKind::Floating(f) => Some((n.id.clone(), f.value.clone(), n.outgoing_edges.clone())),
                _ => None,
            })
            .collect();

        for (id, value, outgoing) in floating_ids {
            self.transition(&id, Status::Complete, None);
            for edge_id in outgoing {
                if let Some(edge) = self.graph.edges.get_mut(&edge_id) {
                    edge.load(Payload::Text(value.clone()), None);
                }
                self.graph.set_status(&edge_id, Status::Complete);
            }
        }
    }

    /// Resolves every `Pending` node's dependency list, and every `Pending`
    /// group's incoming-edge-only activation condition (spec §4.6, "on first
    /// activation"). Returns whether any transition happened this round.
    fn evaluate_dependencies(&mut self) -> bool {
        let mut progressed = false;

        let pending_nodes: Vec<ObjectId> = self
            .graph
            .nodes
            .keys()
            .filter(|id| self.graph.status_of(id) == Status::Pending)
            .cloned()
            .collect();

        for id in pending_nodes {
            let Some(list) = self.graph.dependencies.get(&id).cloned() else {
                continue;
            };
            match self.resolve(&list) {
                Ok(Resolution::Satisfied) => {
                    self.transition(&id, Status::Executing, None);
                    progressed = true;
                }
                Ok(Resolution::Irrecoverable) => {
                    self.reject(&id);
                    progressed = true;
                }
                Ok(Resolution::Pending) => {}
                Err(e) => {
                    self.fatal(&id, e.to_string());
                    return true;
                }
            }
        }

        let pending_groups: Vec<ObjectId> = self
            .graph
            .groups
            .keys()
            .filter(|id| self.graph.status_of(id) == Status::Pending)
            .cloned()
            .collect();

        for id in pending_groups {
            let group = self.graph.groups.get(&id).expect("group exists");
            let mut list = DependencyList::new();
            for edge_id in &group.incoming_edges {
                if let Some(edge) = self.graph.edges.get(edge_id) {
                    if !edge.is_reflexive {
                        list.push_single(edge_id.clone());
                    }
                }
            }
            match self.resolve(&list) {
                Ok(Resolution::Satisfied) => {
                    self.transition(&id, Status::Executing, None);
                    progressed = true;
                }
                Ok(Resolution::Irrecoverable) => {
                    self.reject(&id);
                    progressed = true;
                }
                Ok(Resolution::Pending) => {}
                Err(e) => {
                    self.fatal(&id, e.to_string());
                    return true;
                }
            }
        }

        progressed
    }

    fn resolve(&self, list: &DependencyList) -> crate::error::CannoliResult<Resolution> {
        list.resolve(|id| self.graph.status_of(id))
    }

    /// Marks `id` (and, if it's a node or group, the status cascades to its
    /// outgoing edges) `Rejected` (spec §4.2, §7: "not an error, an ordinary
    /// outcome").
    fn reject(&mut self, id: &ObjectId) {
        self.transition(id, Status::Rejected, None);
        let outgoing: Vec<ObjectId> = if let Some(n) = self.graph.nodes.get(id) {
            n.outgoing_edges.clone()
        } else if let Some(g) = self.graph.groups.get(id) {
            g.outgoing_edges.clone()
        } else {
            Vec::new()
        };
        for edge_id in outgoing {
            if let Some(edge) = self.graph.edges.get_mut(&edge_id) {
                edge.reject();
            }
            self.graph.set_status(&edge_id, Status::Rejected);
        }
    }

    /// For every `Executing` group whose members are all terminal, applies the
    /// iteration decision of spec §4.6: complete, or increment and re-drive.
    /// Returns whether anything changed this round.
    fn process_group_iterations(&mut self) -> bool {
        let group_ids: Vec<ObjectId> = self
            .graph
            .groups
            .keys()
            .filter(|id| self.graph.status_of(id) == Status::Executing)
            .cloned()
            .collect();

        let mut progressed = false;
        for id in group_ids {
            let group = self.graph.groups.get(&id).expect("group exists");
            if group.members.is_empty() {
                // Basic groups with no members complete immediately on activation.
                self.transition(&id, Status::Complete, None);
                progressed = true;
                continue;
            }

            let is_foreach = matches!(group.subtype, GroupSubtype::ForEach { .. });
            let any_reflexive_rejected = group
                .reflexive_incoming_edges
                .iter()
                .any(|e| self.graph.status_of(e) == Status::Rejected);
            let decision = group.iteration_decision(any_reflexive_rejected, |m| self.graph.status_of(m));

            match decision {
                IterationDecision::Wait => {}
                IterationDecision::Complete => {
                    if is_foreach {
                        self.finalize_foreach_outputs(&id);
                    }
                    self.transition(&id, Status::Complete, None);
                    progressed = true;
                }
                IterationDecision::ReDrive => {
                    self.redrive_group(&id);
                    progressed = true;
                }
            }
        }
        progressed
    }

    /// Joins every clone's rendered output into one payload and writes it onto the
    /// group's own outgoing edge(s) (spec §4.6, ForEach completion): the single
    /// `List`-subtype edge a ForEach group is allowed to carry out of it (spec §3,
    /// "a group's own outgoing edges must all be `List`").
    fn finalize_foreach_outputs(&mut self, group_id: &ObjectId) {
        let (members, outgoing) = {
            let group = self.graph.groups.get(group_id).expect("group exists");
            (group.members.clone(), group.outgoing_edges.clone())
        };
        if outgoing.is_empty() {
            return;
        }
        let values: Vec<String> = members
            .iter()
            .filter_map(|m| self.output_text.get(m).cloned())
            .collect();
        if values.is_empty() {
            return;
        }
        let joined = values.join(", ");
        for edge_id in outgoing {
            if let Some(edge) = self.graph.edges.get_mut(&edge_id) {
                edge.load(Payload::Text(joined.clone()), None);
            }
            self.graph.set_status(&edge_id, Status::Complete);
        }
    }

    /// Resets every member, plus every non-reflexive member-outgoing edge,
    /// increments `current_loop`, then re-drives members back to `Pending` (spec
    /// §4.6). This covers both edges crossing out of the group and ordinary
    /// forward edges between two members of the same iteration (e.g. a Call
    /// feeding its sibling Content): both must go back to `Pending` so the next
    /// iteration's dependants wait for a fresh write rather than seeing the
    /// previous iteration's status. Reflexive back-edges are deliberately left
    /// alone — they aren't a dependency of anything and get overwritten by their
    /// source re-executing before anyone reads their status again.
    fn redrive_group(&mut self, group_id: &ObjectId) {
        let (members, reset_edges) = {
            let group = self.graph.groups.get(group_id).expect("group exists");
            let members: Vec<ObjectId> = group.members.clone();
            let mut reset_edges = Vec::new();
            for member in &members {
                let outgoing: Vec<ObjectId> = self
                    .graph
                    .nodes
                    .get(member)
                    .map(|n| n.outgoing_edges.clone())
                    .or_else(|| self.graph.groups.get(member).map(|g| g.outgoing_edges.clone()))
                    .unwrap_or_default();
                for edge_id in outgoing {
                    if let Some(edge) = self.graph.edges.get(&edge_id) {
                        if edge.is_reflexive {
                            continue;
                        }
                    }
                    reset_edges.push(edge_id);
                }
            }
            (members, reset_edges)
        };

        for edge_id in reset_edges {
            if let Some(edge) = self.graph.edges.get_mut(&edge_id) {
                edge.reset();
            }
            self.graph.set_status(&edge_id, Status::Pending);
        }

        for member in &members {
            self.graph.set_status(member, Status::Pending);
            if let Some(n) = self.graph.nodes.get(member) {
                if matches!(n.kind, NodeKind::Content(_)) && crate::node::content::has_incoming_producer(n) {
                    self.output_text.remove(member);
                }
            }
        }

        if let Some(group) = self.graph.groups.get_mut(group_id) {
            group.current_loop += 1;
        }
        tracing::info!(group = %group_id, "re-driving group iteration");
    }

    fn collect_ready_nodes(&self) -> Vec<ObjectId> {
        self.graph
            .nodes
            .keys()
            .filter(|id| self.graph.status_of(id) == Status::Executing)
            .cloned()
            .collect()
    }

    /// Builds an [`ExecutionInput`] snapshot for `id` and runs its behavior,
    /// holding an LLM concurrency permit only for `Call` nodes (spec §5).
    async fn execute_one(&self, id: ObjectId) -> (ObjectId, crate::error::CannoliResult<ExecutionOutput>) {
        let node = self.graph.nodes.get(&id).expect("node exists");
        let incoming_edges: Vec<_> = node
            .incoming_edges
            .iter()
            .filter_map(|e| self.graph.edges.get(e).cloned())
            .collect();
        let outgoing_edges: Vec<_> = node
            .outgoing_edges
            .iter()
            .filter_map(|e| self.graph.edges.get(e).cloned())
            .collect();
        let enclosing_groups: Vec<_> = node
            .enclosing_groups
            .iter()
            .filter_map(|g| self.graph.groups.get(g).cloned())
            .collect();

        let substitution = self.build_substitution(node, &incoming_edges, &enclosing_groups);

        let input = ExecutionInput {
            node,
            incoming_edges,
            outgoing_edges,
            enclosing_groups,
            substitution,
            references: Vec::<Reference>::new(),
        };

        let is_call = matches!(node.kind, NodeKind::Call(_));
        let _permit = if is_call {
            Some(self.limiter.clone().acquire_owned().await.expect("semaphore open"))
        } else {
            None
        };

        let result = match &node.kind {
            NodeKind::Call(call) => crate::node::call::execute(&input, call, &self.caps).await,
            NodeKind::Content(_) => crate::node::content::execute(&input, &self.caps).await,
            NodeKind::Reference(reference) => {
                crate::node::reference_node::execute(&input, reference, &self.caps).await
            }
            NodeKind::Http(_) => crate::node::http::execute(&input, &self.caps).await,
            NodeKind::Formatter(_) => crate::node::formatter::execute(&input, &self.caps).await,
            NodeKind::Floating(floating) => Ok(crate::node::floating::execute(&input, floating)),
        };

        (id, result)
    }

    fn build_substitution(
        &self,
        node: &crate::node::NodeObject,
        incoming_edges: &[crate::edge::Edge],
        enclosing_groups: &[crate::group::Group],
    ) -> SubstitutionContext {
        let mut variables = Vec::new();
        for edge in incoming_edges {
            if edge.text.is_empty() {
                continue;
            }
            if let Some(text) = edge.payload.as_ref().and_then(|p| p.as_text()) {
                variables.push((edge.text.clone(), text.to_string(), edge.is_reflexive));
            }
        }

        let loop_indices: Vec<usize> = enclosing_groups
            .iter()
            .rev()
            .filter(|g| g.max_loops().is_some() || matches!(g.subtype, crate::group::GroupSubtype::ForEach { .. }))
            .map(|g| g.current_loop as usize)
            .collect();

        let floating: HashMap<String, String> = self
            .graph
            .nodes
            .values()
            .filter_map(|n| match &n.kind {
                NodeKind::Floating(f) => Some((f.name.clone(), f.value.clone())),
                _ => None,
            })
            .collect();

        let _ = node;
        SubstitutionContext {
            variables,
            loop_indices,
            floating,
            current_note: None,
        }
    }

    async fn execute_nodes(
        &mut self,
        ids: Vec<ObjectId>,
    ) -> Vec<(ObjectId, crate::error::CannoliResult<ExecutionOutput>)> {
        let futures = ids.into_iter().map(|id| self.execute_one(id));
        futures::future::join_all(futures).await
    }

    /// Applies every node's [`ExecutionOutput`] atomically: status transitions,
    /// edge writes/rejections, and usage accounting (spec §5, "mutated only by
    /// its owning object").
    fn apply_outputs(&mut self, outputs: Vec<(ObjectId, crate::error::CannoliResult<ExecutionOutput>)>) {
        for (id, result) in outputs {
            let output = match result {
                Ok(output) => output,
                Err(e) => {
                    self.fatal(&id, e.to_string());
                    continue;
                }
            };

            if let Some(err) = output.error {
                self.fatal(&id, err);
                continue;
            }

            for warning in &output.warnings {
                self.graph.push_warning(&id, warning.clone());
                if self.settings.stop_on_warning {
                    self.fatal(&id, warning.clone());
                }
            }
            if self.stopped {
                continue;
            }

            if let Some(usage) = &output.usage {
                self.usage.record(usage);
            }

            for edge_id in &output.edge_rejects {
                if let Some(edge) = self.graph.edges.get_mut(edge_id) {
                    edge.reject();
                }
                self.graph.set_status(edge_id, Status::Rejected);
            }

            for (edge_id, payload, messages) in output.edge_writes {
                if let Some(edge) = self.graph.edges.get_mut(&edge_id) {
                    edge.load(payload, messages);
                }
                self.graph.set_status(&edge_id, Status::Complete);
            }

            if let Some(text) = output.new_text {
                self.output_text.insert(id.clone(), text);
            }

            self.transition(&id, Status::Complete, None);
        }
    }
}
