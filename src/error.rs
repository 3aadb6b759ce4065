//! Error types for graph construction, validation, and execution.
//!
//! `CannoliError` follows the taxonomy of spec §7: structural errors (surfaced on a
//! vertex before any behavior executes), runtime transient errors (a node enters
//! `Error` and the run stops), and ambient failures from serialization, I/O, and
//! configuration. `Rejected` is deliberately absent here — a rejection is an
//! ordinary [`crate::status::Status`] transition, never an error.

use thiserror::Error;

pub type CannoliResult<T> = std::result::Result<T, CannoliError>;

/// Errors that can occur while building, validating, or executing a graph.
#[derive(Error, Debug)]
pub enum CannoliError {
    /// A structural validation failure (§4.1): enclosure/overlap violation, exit-and-
    /// reenter path, missing label, illegal outgoing edge subtype on a group, a cycle
    /// in the dependency DAG, or a duplicate reference definition.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// A node's behavior returned an unrecoverable fault during execution.
    #[error("node '{node}' failed: {error}")]
    NodeExecution { node: String, error: String },

    /// An execution failure with no single node to blame (e.g. scheduler invariant
    /// violated).
    #[error("execution failed: {0}")]
    Execution(String),

    /// A dependency cluster completed more than one member simultaneously —
    /// a configuration bug (duplicate variable definitions both reachable).
    #[error("duplicate variable definition: {0}")]
    DuplicateVariable(String),

    /// JSON (de)serialization failure, e.g. decoding a canvas or mock fixture.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing failure, e.g. loading run settings.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing failure, e.g. loading run settings.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O failure reading a settings or fixture file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation (typically an LLM or HTTP call) exceeded its time budget.
    #[error("operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// Application-defined error not covered by another variant.
    #[error("{0}")]
    Custom(String),
}

impl CannoliError {
    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }
}
