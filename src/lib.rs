//! Cannoli: an engine that executes a typed dataflow graph built from
//! canvas-authored nodes, edges, and groups (see `SPEC_FULL.md` for the full
//! component design).
//!
//! The typical entry point is [`run::run`]: build [`graph::RawVertex`]/
//! [`graph::RawEdge`] lists (from whatever canvas source the host reads), bundle
//! a [`capabilities::Capabilities`] (or use [`mock::mock_capabilities`] for a
//! pure, deterministic test double), and call `run::run(vertices, edges, caps,
//! settings)`.

pub mod canvas_effects;
pub mod capabilities;
pub mod data_providers;
pub mod dependency;
pub mod edge;
pub mod error;
pub mod graph;
pub mod group;
pub mod http_client;
pub mod ids;
pub mod llm;
pub mod loader;
pub mod messages;
pub mod mock;
pub mod node;
pub mod reference;
pub mod run;
pub mod scheduler;
pub mod status;
pub mod validate;
pub mod vault;

pub use capabilities::Capabilities;
pub use error::{CannoliError, CannoliResult};
pub use graph::{Graph, RawEdge, RawVertex};
pub use ids::ObjectId;
pub use run::{run, RunSettings, RunSummary, StopReason, Usage};
pub use status::{Status, UpdateEvent};
