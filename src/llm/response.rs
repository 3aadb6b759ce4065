//! Response types returned by [`crate::llm::traits::LlmProvider`].

use crate::messages::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prompt/completion token accounting, rolled up into the run's usage accumulator
/// (spec §3, "usage accounting").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete, non-streamed response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    pub metadata: HashMap<String, String>,
}

/// A single chunk of a streamed response, broadcast to every `ChatResponse` edge as
/// it arrives (spec §4.7, "streaming mode").
#[derive(Debug, Clone)]
pub struct MessageChunk {
    pub delta: String,
    pub is_final: bool,
}

/// Returned by [`crate::llm::traits::LlmProvider::stream`]; the caller drains
/// `chunks` to completion and then reads `usage` (populated once the stream ends).
pub struct ChatStreamResponse {
    pub chunks: tokio_stream::wrappers::ReceiverStream<MessageChunk>,
}
