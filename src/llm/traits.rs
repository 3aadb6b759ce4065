//! Core trait for the injected LLM collaborator (spec §6).
//!
//! Cannoli is an orchestration engine, not an LLM client library: the core crate
//! defines [`LlmProvider`], and callers implement it for whichever concrete SDK they
//! use. [`crate::mock::MockLlmProvider`] is the reference implementation used by
//! mock-mode runs and the test suite.

use crate::error::CannoliResult;
use crate::llm::config::ChatRequest;
use crate::llm::response::{ChatResponse, ChatStreamResponse};
use async_trait::async_trait;

/// Provider-agnostic chat completion contract.
///
/// Implementations must be `Send + Sync`: nodes hold a shared `Arc<dyn LlmProvider>`
/// and call it from concurrently-executing tasks gated by the run's concurrency
/// limiter (spec §5).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a complete response. Used whenever none of the node's outgoing
    /// edges is a `ChatResponse` edge (spec §4.7).
    async fn chat(&self, request: ChatRequest) -> CannoliResult<ChatResponse>;

    /// Stream a response chunk by chunk. Used whenever the node has at least one
    /// `ChatResponse` outgoing edge (spec §4.7, "streaming mode").
    async fn stream(&self, request: ChatRequest) -> CannoliResult<ChatStreamResponse>;

    /// Health check, e.g. for local models whose server may not be running.
    /// Default assumes availability.
    async fn is_available(&self) -> CannoliResult<bool> {
        Ok(true)
    }

    /// Whether this provider performs no real external call (spec §5: "a mock
    /// mode disables all external side-effects"). `run::run` checks this
    /// against `RunSettings::mock_mode` so the flag can't silently desync
    /// from the capabilities actually injected; real providers keep the
    /// default `false`.
    fn is_mock(&self) -> bool {
        false
    }

    fn clone_box(&self) -> Box<dyn LlmProvider>;
}

impl Clone for Box<dyn LlmProvider> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
