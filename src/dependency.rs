//! Dependency resolution (spec §4.3).
//!
//! Each object's dependency list holds either a single object id or a disjunctive
//! cluster of ids — alternatives representing "the same variable name supplied by
//! distinct branches of a Choose node". A cluster is satisfied when any member
//! completes and irrecoverable only once every member has rejected.

use crate::error::{CannoliError, CannoliResult};
use crate::ids::ObjectId;
use crate::status::Status;

/// One entry in an object's dependency list.
#[derive(Debug, Clone)]
pub enum Dependency {
    Single(ObjectId),
    /// Alternatives; at most one member may ever complete. Simultaneous completion
    /// of more than one is a hard configuration error (spec §4.3).
    Cluster(Vec<ObjectId>),
}

/// Outcome of re-evaluating an object's dependency list against current statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Not every dependency is decided yet.
    Pending,
    /// All dependencies are satisfied; the object may move to `Executing`.
    Satisfied,
    /// At least one dependency can never be satisfied; the object should move to
    /// `Rejected`.
    Irrecoverable,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyList {
    pub entries: Vec<Dependency>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_single(&mut self, id: ObjectId) {
        self.entries.push(Dependency::Single(id));
    }

    pub fn push_cluster(&mut self, ids: Vec<ObjectId>) {
        self.entries.push(Dependency::Cluster(ids));
    }

    /// Evaluates the list. `status_of` resolves the current status of any id; it is
    /// given the full, immutable snapshot for this pass (spec §5, "cross-object
    /// reads are immutable snapshots").
    ///
    /// Returns an error if a cluster has more than one member simultaneously
    /// `Complete` (duplicate variable definition, spec §4.3 / §8 scenario 6).
    pub fn resolve(&self, status_of: impl Fn(&ObjectId) -> Status) -> CannoliResult<Resolution> {
        let mut all_satisfied = true;
        let mut any_irrecoverable = false;

        for dep in &self.entries {
            match dep {
                Dependency::Single(id) => {
                    let status = status_of(id);
                    if status.is_rejected() {
                        any_irrecoverable = true;
                    } else if !status.is_complete() {
                        all_satisfied = false;
                    }
                }
                Dependency::Cluster(ids) => {
                    let completed: Vec<&ObjectId> = ids
                        .iter()
                        .filter(|id| status_of(id).is_complete())
                        .collect();
                    if completed.len() > 1 {
                        return Err(CannoliError::DuplicateVariable(format!(
                            "{} of {} cluster members completed simultaneously",
                            completed.len(),
                            ids.len()
                        )));
                    }
                    if completed.is_empty() {
                        let all_rejected = ids.iter().all(|id| status_of(id).is_rejected());
                        if all_rejected {
                            any_irrecoverable = true;
                        } else {
                            all_satisfied = false;
                        }
                    }
                }
            }
        }

        if any_irrecoverable {
            Ok(Resolution::Irrecoverable)
        } else if all_satisfied {
            Ok(Resolution::Satisfied)
        } else {
            Ok(Resolution::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(statuses: &HashMap<ObjectId, Status>) -> impl Fn(&ObjectId) -> Status + '_ {
        move |id| statuses.get(id).copied().unwrap_or(Status::Pending)
    }

    #[test]
    fn single_dependency_is_pending_until_its_source_settles() {
        let mut list = DependencyList::new();
        list.push_single(ObjectId::new("a"));

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("a"), Status::Executing);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Pending);

        statuses.insert(ObjectId::new("a"), Status::Complete);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Satisfied);

        statuses.insert(ObjectId::new("a"), Status::Rejected);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Irrecoverable);
    }

    #[test]
    fn cluster_is_pending_while_every_member_is_still_undecided() {
        let mut list = DependencyList::new();
        list.push_cluster(vec![ObjectId::new("a"), ObjectId::new("b")]);

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("a"), Status::Executing);
        statuses.insert(ObjectId::new("b"), Status::Pending);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Pending);
    }

    #[test]
    fn cluster_is_satisfied_once_exactly_one_member_completes() {
        let mut list = DependencyList::new();
        list.push_cluster(vec![ObjectId::new("a"), ObjectId::new("b")]);

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("a"), Status::Complete);
        statuses.insert(ObjectId::new("b"), Status::Rejected);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Satisfied);
    }

    #[test]
    fn cluster_is_irrecoverable_only_once_every_member_has_rejected() {
        let mut list = DependencyList::new();
        list.push_cluster(vec![ObjectId::new("a"), ObjectId::new("b")]);

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("a"), Status::Rejected);
        statuses.insert(ObjectId::new("b"), Status::Executing);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Pending);

        statuses.insert(ObjectId::new("b"), Status::Rejected);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Irrecoverable);
    }

    #[test]
    fn two_simultaneously_complete_cluster_members_is_a_duplicate_variable_error() {
        let mut list = DependencyList::new();
        list.push_cluster(vec![ObjectId::new("a"), ObjectId::new("b"), ObjectId::new("c")]);

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("a"), Status::Complete);
        statuses.insert(ObjectId::new("b"), Status::Complete);
        statuses.insert(ObjectId::new("c"), Status::Rejected);

        let err = list.resolve(lookup(&statuses)).unwrap_err();
        assert!(matches!(err, CannoliError::DuplicateVariable(_)));
    }

    #[test]
    fn a_mix_of_single_and_cluster_entries_requires_both_to_be_satisfied() {
        let mut list = DependencyList::new();
        list.push_single(ObjectId::new("x"));
        list.push_cluster(vec![ObjectId::new("a"), ObjectId::new("b")]);

        let mut statuses = HashMap::new();
        statuses.insert(ObjectId::new("x"), Status::Complete);
        statuses.insert(ObjectId::new("a"), Status::Complete);
        statuses.insert(ObjectId::new("b"), Status::Rejected);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Satisfied);

        statuses.insert(ObjectId::new("x"), Status::Executing);
        assert_eq!(list.resolve(lookup(&statuses)).unwrap(), Resolution::Pending);
    }
}
