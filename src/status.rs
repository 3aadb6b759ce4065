//! The per-object state machine (spec §4.2).
//!
//! Every [`crate::graph::GraphObject`] — node, edge, or group — carries a [`Status`].
//! Transitions are one-way toward a terminal state and each transition emits exactly
//! one [`UpdateEvent`], observed by the scheduler in emission order (spec §5,
//! "ordering guarantees").

use crate::ids::ObjectId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a node, edge, or group.
///
/// `Pending` is the only non-terminal state besides `Executing`; `Complete`,
/// `Rejected`, and `Error` are terminal and never transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Executing,
    Complete,
    Rejected,
    Error,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete | Status::Rejected | Status::Error)
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Status::Complete)
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, Status::Rejected)
    }
}

/// Emitted once per status change, never re-emitted without an actual change
/// (spec §8, "no status is re-emitted without change").
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub object: ObjectId,
    pub status: Status,
    pub message: Option<String>,
}

impl UpdateEvent {
    pub fn new(object: ObjectId, status: Status, message: Option<String>) -> Self {
        Self {
            object,
            status,
            message,
        }
    }
}
