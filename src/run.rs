//! Run configuration, usage accounting, and the `run(graph, capabilities, settings)
//! -> onFinish` entry point (spec §5, §6).

use crate::capabilities::Capabilities;
use crate::error::CannoliResult;
use crate::graph::{RawEdge, RawVertex};
use crate::ids::ObjectId;
use crate::llm::response::UsageMetadata;
use crate::loader;
use crate::scheduler::Scheduler;
use crate::validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run-wide configuration (spec §9.3 of `SPEC_FULL.md`): the LLM concurrency
/// bound, mock mode, default sampling options, and whether a soft warning should
/// itself stop the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Bounds the number of in-flight LLM requests; excess calls queue FIFO
    /// (spec §5, default 50).
    pub p_limit: usize,
    pub mock_mode: bool,
    pub default_model: Option<String>,
    pub default_temperature: Option<f32>,
    /// Per-token cost used for `total_cost` accounting, grounded on the teacher's
    /// `LlmPricing::calculate_cost` (spec §9.1 usage accounting is otherwise
    /// provider-defined; this is a flat fallback rate).
    pub cost_per_prompt_token: f64,
    pub cost_per_completion_token: f64,
    /// When true, any soft warning (spec §7) is treated as fatal instead of
    /// allowed to continue.
    pub stop_on_warning: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            p_limit: 50,
            mock_mode: false,
            default_model: None,
            default_temperature: None,
            cost_per_prompt_token: 0.000_003,
            cost_per_completion_token: 0.000_015,
            stop_on_warning: false,
        }
    }
}

impl RunSettings {
    /// Loads settings from a TOML or YAML file, picking the format by extension
    /// (mirrors the teacher's `config::loader` dual-format support).
    pub fn from_file(path: impl AsRef<Path>) -> CannoliResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&raw)?),
            _ => Ok(toml::from_str(&raw)?),
        }
    }
}

/// Why a run ended (spec §5, "Cancellation").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    User,
    Error,
    Complete,
}

/// Aggregated token usage across every LLM call made during the run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub call_count: u64,
}

impl Usage {
    pub fn record(&mut self, usage: &UsageMetadata) {
        self.prompt_tokens += usage.prompt_tokens as u64;
        self.completion_tokens += usage.completion_tokens as u64;
        self.total_tokens += usage.total_tokens as u64;
        self.call_count += 1;
    }

    pub fn cost(&self, settings: &RunSettings) -> f64 {
        self.prompt_tokens as f64 * settings.cost_per_prompt_token
            + self.completion_tokens as f64 * settings.cost_per_completion_token
    }
}

/// What `onFinish` reports (spec §6): the reason the run stopped, accumulated
/// usage/cost, and an optional human-readable message (populated on `Error`).
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub usage: Usage,
    pub total_cost: f64,
    pub message: Option<String>,
    /// Soft warnings accumulated per vertex during the run (spec §7).
    pub warnings: std::collections::HashMap<ObjectId, Vec<String>>,
    /// Rendered text left on Content/Formatter nodes at run end, keyed by id —
    /// the caller's window into what the graph produced.
    pub output_text: std::collections::HashMap<ObjectId, String>,
    /// How many times each node entered `Executing`, keyed by id — lets tests
    /// assert a Repeat(N) group drove its members exactly N times (spec §8).
    pub executing_counts: std::collections::HashMap<ObjectId, u32>,
    /// Final status of every vertex and edge, keyed by id — lets tests assert a
    /// rejected branch (or an `Error`-classified vertex) ended in the expected
    /// terminal state (spec §8).
    pub statuses: std::collections::HashMap<ObjectId, crate::status::Status>,
}

/// Validates, then executes, a graph built from raw canvas vertices/edges,
/// reporting a [`RunSummary`] once the run reaches a terminal state (spec §6,
/// "a single `run(graph, capabilities, settings) -> onFinish(...)` entry").
#[tracing::instrument(skip(vertices, edges, caps, settings))]
pub async fn run(
    vertices: &[RawVertex],
    edges: &[RawEdge],
    caps: Capabilities,
    settings: RunSettings,
) -> RunSummary {
    if settings.mock_mode != caps.llm.is_mock() {
        let message = format!(
            "run settings declare mock_mode={} but the injected LLM provider's is_mock() is {}; \
             capability selection and mock_mode must agree",
            settings.mock_mode,
            caps.llm.is_mock()
        );
        tracing::error!(%message, "mock mode mismatch");
        return RunSummary {
            reason: StopReason::Error,
            usage: Usage::default(),
            total_cost: 0.0,
            message: Some(message),
            warnings: std::collections::HashMap::new(),
            output_text: std::collections::HashMap::new(),
            executing_counts: std::collections::HashMap::new(),
            statuses: std::collections::HashMap::new(),
        };
    }

    let (graph, classification_errors) = loader::load(vertices, edges);

    if let Some((vertex, message)) = classification_errors.into_iter().next() {
        tracing::error!(%vertex, %message, "graph classification failed");
        return RunSummary {
            reason: StopReason::Error,
            usage: Usage::default(),
            total_cost: 0.0,
            message: Some(format!("{}: {}", vertex, message)),
            warnings: graph.warnings,
            output_text: std::collections::HashMap::new(),
            executing_counts: std::collections::HashMap::new(),
            statuses: graph.statuses,
        };
    }

    let validation_errors = validate::validate(&graph);
    if let Some(first) = validation_errors.first() {
        tracing::error!(vertex = %first.vertex, message = %first.message, "validation failed");
        return RunSummary {
            reason: StopReason::Error,
            usage: Usage::default(),
            total_cost: 0.0,
            message: Some(format!("{}: {}", first.vertex, first.message)),
            warnings: graph.warnings,
            output_text: std::collections::HashMap::new(),
            executing_counts: std::collections::HashMap::new(),
            statuses: graph.statuses,
        };
    }

    let mut graph = graph;
    loader::materialize_foreach(&mut graph);

    let mut scheduler = Scheduler::new(graph, std::sync::Arc::new(caps), settings.clone());
    let (reason, message) = scheduler.drive().await;

    RunSummary {
        reason,
        usage: scheduler.usage,
        total_cost: scheduler.usage.cost(&settings),
        message,
        warnings: scheduler.graph.warnings,
        output_text: scheduler.output_text,
        executing_counts: scheduler.executing_counts,
        statuses: scheduler.graph.statuses,
    }
}
