//! Group iteration controllers (spec §4.6).

use crate::graph::Rect;
use crate::ids::ObjectId;
use crate::status::Status;
use serde::{Deserialize, Serialize};

/// Concrete iteration behavior of a group (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupSubtype {
    /// Completes immediately when activated; exists only to scope variables.
    Basic,
    /// Re-drives members up to `max_loops` times.
    Repeat { max_loops: u32 },
    /// Like Repeat, but also stops early on a rejected reflexive incoming edge.
    While { max_loops: u32 },
    /// `versions` parallel clones of the enclosed subgraph, already materialized
    /// by the loader; the group completes when all clones complete.
    ForEach { versions: u32 },
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: ObjectId,
    pub rect: Rect,
    pub members: Vec<ObjectId>,
    /// Sorted innermost to outermost, like a node's (spec §3): a group can itself
    /// be nested inside another group.
    pub enclosing_groups: Vec<ObjectId>,
    pub subtype: GroupSubtype,
    pub current_loop: u32,
    pub status: Status,
    /// Non-reflexive incoming edges of this group; contribute to every member's
    /// dependency list (spec §4.3).
    pub incoming_edges: Vec<ObjectId>,
    pub outgoing_edges: Vec<ObjectId>,
    /// Reflexive incoming edges, tracked separately so a While group can inspect
    /// them for its stop condition without them counting as dependencies.
    pub reflexive_incoming_edges: Vec<ObjectId>,
    /// For a `ForEach` group, the original (un-cloned) member ids, recorded before
    /// the loader's clone-materialization pass expands `members` with `#index`
    /// clones. Empty for every other subtype.
    pub foreach_template: Vec<ObjectId>,
}

impl Group {
    pub fn new(id: ObjectId, rect: Rect, subtype: GroupSubtype) -> Self {
        Self {
            id,
            rect,
            members: Vec::new(),
            enclosing_groups: Vec::new(),
            subtype,
            current_loop: 0,
            status: Status::Pending,
            incoming_edges: Vec::new(),
            outgoing_edges: Vec::new(),
            reflexive_incoming_edges: Vec::new(),
            foreach_template: Vec::new(),
        }
    }

    pub fn max_loops(&self) -> Option<u32> {
        match self.subtype {
            GroupSubtype::Repeat { max_loops } => Some(max_loops),
            GroupSubtype::While { max_loops } => Some(max_loops),
            GroupSubtype::Basic | GroupSubtype::ForEach { .. } => None,
        }
    }

    /// Whether every member has reached a terminal status.
    pub fn all_members_terminal(&self, status_of: impl Fn(&ObjectId) -> Status) -> bool {
        self.members.iter().all(|m| status_of(m).is_terminal())
    }

    /// Decision for what the scheduler should do once every member of a Repeat or
    /// While group has reached a terminal status (spec §4.6).
    pub fn iteration_decision(
        &self,
        any_reflexive_incoming_rejected: bool,
        status_of: impl Fn(&ObjectId) -> Status,
    ) -> IterationDecision {
        match self.subtype {
            GroupSubtype::Basic => IterationDecision::Complete,
            GroupSubtype::ForEach { .. } => {
                if self.all_members_terminal(status_of) {
                    IterationDecision::Complete
                } else {
                    IterationDecision::Wait
                }
            }
            GroupSubtype::Repeat { max_loops } => {
                if !self.all_members_terminal(&status_of) {
                    IterationDecision::Wait
                } else if self.current_loop + 1 < max_loops {
                    IterationDecision::ReDrive
                } else {
                    IterationDecision::Complete
                }
            }
            GroupSubtype::While { max_loops } => {
                if !self.all_members_terminal(&status_of) {
                    IterationDecision::Wait
                } else if any_reflexive_incoming_rejected {
                    IterationDecision::Complete
                } else if self.current_loop + 1 < max_loops {
                    IterationDecision::ReDrive
                } else {
                    IterationDecision::Complete
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationDecision {
    /// Not every member has reached a terminal state yet.
    Wait,
    /// Increment `current_loop`, reset members and out-of-group edges, re-drive.
    ReDrive,
    /// The group itself transitions to `Complete`.
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_with_members(subtype: GroupSubtype, members: &[&str]) -> Group {
        let mut group = Group::new(
            ObjectId::new("g"),
            Rect { x: 0.0, y: 0.0, w: 100.0, h: 100.0 },
            subtype,
        );
        group.members = members.iter().map(|m| ObjectId::new(*m)).collect();
        group
    }

    fn status_of(complete: &[&str]) -> impl Fn(&ObjectId) -> Status + '_ {
        move |id| {
            if complete.contains(&id.as_str()) {
                Status::Complete
            } else {
                Status::Executing
            }
        }
    }

    #[test]
    fn basic_group_completes_immediately_regardless_of_members() {
        let group = group_with_members(GroupSubtype::Basic, &["a"]);
        assert_eq!(
            group.iteration_decision(false, status_of(&[])),
            IterationDecision::Complete
        );
    }

    #[test]
    fn foreach_group_waits_until_every_clone_is_terminal_then_completes() {
        let group = group_with_members(GroupSubtype::ForEach { versions: 2 }, &["a", "b"]);
        assert_eq!(
            group.iteration_decision(false, status_of(&["a"])),
            IterationDecision::Wait
        );
        assert_eq!(
            group.iteration_decision(false, status_of(&["a", "b"])),
            IterationDecision::Complete
        );
    }

    #[test]
    fn repeat_group_redrives_until_the_last_pass_then_completes() {
        let mut group = group_with_members(GroupSubtype::Repeat { max_loops: 3 }, &["a"]);

        assert_eq!(
            group.iteration_decision(false, status_of(&[])),
            IterationDecision::Wait
        );

        group.current_loop = 0;
        assert_eq!(
            group.iteration_decision(false, status_of(&["a"])),
            IterationDecision::ReDrive
        );

        group.current_loop = 2;
        assert_eq!(
            group.iteration_decision(false, status_of(&["a"])),
            IterationDecision::Complete
        );
    }

    #[test]
    fn while_group_completes_early_on_a_rejected_reflexive_edge_even_mid_budget() {
        let mut group = group_with_members(GroupSubtype::While { max_loops: 5 }, &["a"]);
        group.current_loop = 1;

        assert_eq!(
            group.iteration_decision(true, status_of(&["a"])),
            IterationDecision::Complete
        );
        assert_eq!(
            group.iteration_decision(false, status_of(&["a"])),
            IterationDecision::ReDrive
        );
    }

    #[test]
    fn while_group_completes_once_its_loop_budget_is_exhausted() {
        let mut group = group_with_members(GroupSubtype::While { max_loops: 2 }, &["a"]);
        group.current_loop = 1;
        assert_eq!(
            group.iteration_decision(false, status_of(&["a"])),
            IterationDecision::Complete
        );
    }
}
