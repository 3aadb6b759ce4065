//! Deterministic test doubles for the injected capabilities of spec §6.
//!
//! Mock mode disables every external side effect and synthesizes plausible
//! function-call responses, so the same graph run twice under mock produces
//! identical `onFinish` reasons and usage (spec §8, "Mock mode is pure").

use crate::capabilities::Capabilities;
use crate::error::CannoliResult;
use crate::http_client::HttpTemplateExecutor;
use crate::llm::config::ChatRequest;
use crate::llm::response::{ChatResponse, ChatStreamResponse, MessageChunk, UsageMetadata};
use crate::llm::tools::ToolCall;
use crate::llm::traits::LlmProvider;
use crate::messages::Message;
use crate::vault::Vault;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;

/// Returns a fully mocked [`Capabilities`] bundle: [`MockLlmProvider`],
/// [`MockVault`], and [`MockHttpTemplateExecutor`], all with their defaults.
pub fn mock_capabilities() -> Capabilities {
    Capabilities::new(
        std::sync::Arc::new(MockLlmProvider::default()),
        std::sync::Arc::new(MockVault::default()),
        std::sync::Arc::new(MockHttpTemplateExecutor),
    )
}

/// Deterministic LLM stand-in. Absent an explicit `forced_choice`/`forced_fields`
/// override, every function call is resolved to its first declared option, making
/// repeated mock runs of the same graph produce identical traces.
pub struct MockLlmProvider {
    pub default_response: String,
    pub forced_choice: Option<String>,
    pub forced_note: Option<String>,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self {
            default_response: "Mock response".to_string(),
            forced_choice: None,
            forced_note: None,
        }
    }
}

impl MockLlmProvider {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            ..Self::default()
        }
    }

    pub fn with_choice(mut self, branch: impl Into<String>) -> Self {
        self.forced_choice = Some(branch.into());
        self
    }

    fn resolve_tool_call(&self, request: &ChatRequest) -> Option<ToolCall> {
        let tool = request.config.tools.first()?;
        let enum_values = |key: &str| -> Vec<String> {
            tool.parameters
                .as_ref()
                .and_then(|p| p.get("properties"))
                .and_then(|p| p.get(key))
                .and_then(|p| p.get("enum"))
                .and_then(|e| e.as_array())
                .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };

        match tool.name.as_str() {
            "choice" => {
                let options = enum_values("branch");
                let chosen = self
                    .forced_choice
                    .clone()
                    .filter(|c| options.contains(c))
                    .or_else(|| options.first().cloned())?;
                Some(ToolCall::new(
                    "mock-call-1",
                    "choice",
                    serde_json::json!({ "branch": chosen }),
                ))
            }
            "form" => {
                let required = tool
                    .parameters
                    .as_ref()
                    .and_then(|p| p.get("required"))
                    .and_then(|r| r.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
                    .unwrap_or_default();
                let mut args = serde_json::Map::new();
                for field in required {
                    let value = format!("mock-{}", field);
                    args.insert(field, serde_json::Value::String(value));
                }
                Some(ToolCall::new("mock-call-1", "form", serde_json::Value::Object(args)))
            }
            "note_select" => {
                let options = enum_values("note");
                let chosen = self
                    .forced_note
                    .clone()
                    .filter(|c| options.contains(c))
                    .or_else(|| options.first().cloned())?;
                Some(ToolCall::new(
                    "mock-call-1",
                    "note_select",
                    serde_json::json!({ "note": chosen }),
                ))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, request: ChatRequest) -> CannoliResult<ChatResponse> {
        let tool_call = self.resolve_tool_call(&request);
        let message = match &tool_call {
            Some(call) => Message::assistant(self.default_response.clone()).with_tool_calls(vec![call.clone()]),
            None => Message::assistant(self.default_response.clone()),
        };
        Ok(ChatResponse {
            message,
            usage: Some(UsageMetadata {
                prompt_tokens: request.messages.len() as u32 * 8,
                completion_tokens: 8,
                total_tokens: request.messages.len() as u32 * 8 + 8,
            }),
            metadata: HashMap::new(),
        })
    }

    async fn stream(&self, request: ChatRequest) -> CannoliResult<ChatStreamResponse> {
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        let text = self.default_response.clone();
        let tool_call = self.resolve_tool_call(&request);
        tokio::spawn(async move {
            for word in text.split_inclusive(' ') {
                let _ = tx
                    .send(MessageChunk {
                        delta: word.to_string(),
                        is_final: false,
                    })
                    .await;
            }
            let _ = tx
                .send(MessageChunk {
                    delta: String::new(),
                    is_final: true,
                })
                .await;
            drop(tool_call);
        });
        Ok(ChatStreamResponse {
            chunks: ReceiverStream::new(rx),
        })
    }

    fn clone_box(&self) -> Box<dyn LlmProvider> {
        Box::new(MockLlmProvider {
            default_response: self.default_response.clone(),
            forced_choice: self.forced_choice.clone(),
            forced_note: self.forced_note.clone(),
        })
    }

    fn is_mock(&self) -> bool {
        true
    }
}

/// In-memory note store backing [`Vault`] for mock-mode runs and tests.
#[derive(Default)]
pub struct MockVault {
    notes: Mutex<HashMap<String, String>>,
    properties: Mutex<HashMap<String, HashMap<String, String>>>,
    paths: Mutex<HashMap<String, String>>,
}

impl MockVault {
    pub fn with_note(self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.notes.lock().unwrap().insert(name.into(), body.into());
        self
    }
}

#[async_trait]
impl Vault for MockVault {
    async fn read_note(&self, name: &str, subpath: Option<&str>) -> CannoliResult<Option<String>> {
        let notes = self.notes.lock().unwrap();
        Ok(notes.get(name).map(|body| match subpath {
            Some(heading) => body
                .lines()
                .skip_while(|l| !l.trim_start().starts_with(&format!("# {}", heading)))
                .collect::<Vec<_>>()
                .join("\n"),
            None => body.clone(),
        }))
    }

    async fn edit_note(&self, name: &str, content: &str, append: bool) -> CannoliResult<Option<()>> {
        let mut notes = self.notes.lock().unwrap();
        match notes.get_mut(name) {
            Some(existing) => {
                if append {
                    existing.push('\n');
                    existing.push_str(content);
                } else {
                    *existing = content.to_string();
                }
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    async fn create_note_at_path(
        &self,
        name: &str,
        path: Option<&str>,
        content: Option<&str>,
    ) -> CannoliResult<Option<String>> {
        let mut notes = self.notes.lock().unwrap();
        let mut final_name = name.to_string();
        let mut suffix = 1;
        while notes.contains_key(&final_name) {
            final_name = format!("{} {}", name, suffix);
            suffix += 1;
        }
        notes.insert(final_name.clone(), content.unwrap_or_default().to_string());
        if let Some(path) = path {
            self.paths.lock().unwrap().insert(final_name.clone(), path.to_string());
        }
        Ok(Some(final_name))
    }

    async fn get_path(&self, name: &str) -> CannoliResult<Option<String>> {
        Ok(self.paths.lock().unwrap().get(name).cloned())
    }

    async fn get_property(&self, name: &str, prop: &str, _yaml_format: bool) -> CannoliResult<Option<String>> {
        Ok(self
            .properties
            .lock()
            .unwrap()
            .get(name)
            .and_then(|props| props.get(prop))
            .cloned())
    }

    async fn set_property(&self, name: &str, prop: &str, value: &str) -> CannoliResult<()> {
        self.properties
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .insert(prop.to_string(), value.to_string());
        Ok(())
    }

    async fn list_properties(&self, name: &str) -> CannoliResult<HashMap<String, String>> {
        Ok(self.properties.lock().unwrap().get(name).cloned().unwrap_or_default())
    }

    async fn move_note(&self, name: &str, new_path: &str) -> CannoliResult<()> {
        self.paths.lock().unwrap().insert(name.to_string(), new_path.to_string());
        Ok(())
    }

    async fn create_folder(&self, _path: &str) -> CannoliResult<()> {
        Ok(())
    }
}

/// Echoes the interpolated body back, prefixed by the template name; good enough
/// for mock-mode runs where no real endpoint exists.
pub struct MockHttpTemplateExecutor;

#[async_trait]
impl HttpTemplateExecutor for MockHttpTemplateExecutor {
    async fn execute_template(&self, _template: &str, body: &str) -> CannoliResult<String> {
        Ok(format!("mock-http-response: {}", body))
    }
}
