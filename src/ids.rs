//! Object identifiers used as arena keys throughout the engine.
//!
//! The graph is modeled as a flat lookup table (see [`crate::graph::Graph`]); every
//! vertex, edge, and group names its neighbors by [`ObjectId`] rather than holding
//! direct references. This mirrors the source's reliance on a flat id table and
//! avoids cyclic ownership between nodes, edges, and groups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a [`crate::graph::GraphObject`] within a single run.
///
/// IDs are assigned by the canvas loader (out of scope here) and are opaque beyond
/// equality and ordering; the engine never parses or generates them on its own
/// except in tests and the `for-each` clone machinery, which derives clone ids by
/// suffixing the template id with the clone index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Derives the id of the `index`-th clone of a for-each template vertex.
    pub fn clone_id(&self, index: usize) -> Self {
        Self(format!("{}#{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
