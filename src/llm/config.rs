//! Request configuration for [`crate::llm::traits::LlmProvider`].

use crate::llm::tools::ToolDefinition;
use crate::messages::Message;
use serde::{Deserialize, Serialize};

/// Provider-neutral sampling and generation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub top_p: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Overrides applied by `Config` edges walking enclosing groups outermost to
    /// innermost then the node itself (spec §4.7). Unknown keys are a node-level
    /// error at resolution time, not here.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatConfig {
    /// Applies a single `Config` edge override by key, outermost-group-first.
    /// Known keys (`model`, `temperature`, `max_tokens`, `top_p`) are typed in
    /// directly; anything else lands in `extra` for the node to interpret (or
    /// reject as an unknown key).
    pub fn apply_override(&mut self, key: &str, value: serde_json::Value) {
        match key {
            "model" => {
                if let Some(s) = value.as_str() {
                    self.model = Some(s.to_string());
                }
            }
            "temperature" => {
                if let Some(f) = value.as_f64() {
                    self.temperature = Some(f as f32);
                }
            }
            "max_tokens" => {
                if let Some(n) = value.as_u64() {
                    self.max_tokens = Some(n as usize);
                }
            }
            "top_p" => {
                if let Some(f) = value.as_f64() {
                    self.top_p = Some(f as f32);
                }
            }
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }
}

/// A request to a chat model: assembled messages plus configuration.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.config.tools = tools;
        self
    }
}
