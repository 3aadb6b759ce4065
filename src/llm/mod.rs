//! LLM integration traits and types.
//!
//! Cannoli does not ship a concrete LLM client: it defines the contract
//! ([`LlmProvider`]) that a Call node (§4.7) drives, and callers bring their own
//! provider adapter. See [`crate::mock`] for the deterministic test double.

pub mod config;
pub mod response;
pub mod tools;
pub mod traits;

pub use config::{ChatConfig, ChatRequest};
pub use response::{ChatResponse, ChatStreamResponse, MessageChunk, UsageMetadata};
pub use tools::{ToolCall, ToolDefinition};
pub use traits::LlmProvider;
