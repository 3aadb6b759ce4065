//! Bundles the injected collaborators a run needs (spec §6).
//!
//! `Capabilities` is constructed once by the caller and shared (via `Arc`) across
//! every node in the run; it is the engine's only door to the outside world.

use crate::canvas_effects::{CanvasEffects, NoopCanvasEffects};
use crate::data_providers::DataProvider;
use crate::http_client::HttpTemplateExecutor;
use crate::llm::LlmProvider;
use crate::vault::Vault;
use std::sync::Arc;

pub struct Capabilities {
    pub llm: Arc<dyn LlmProvider>,
    pub vault: Arc<dyn Vault>,
    pub http: Arc<dyn HttpTemplateExecutor>,
    pub data: Option<Arc<dyn DataProvider>>,
    pub canvas: Arc<dyn CanvasEffects>,
}

impl Capabilities {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        vault: Arc<dyn Vault>,
        http: Arc<dyn HttpTemplateExecutor>,
    ) -> Self {
        Self {
            llm,
            vault,
            http,
            data: None,
            canvas: Arc::new(NoopCanvasEffects),
        }
    }

    pub fn with_data_provider(mut self, data: Arc<dyn DataProvider>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_canvas_effects(mut self, canvas: Arc<dyn CanvasEffects>) -> Self {
        self.canvas = canvas;
        self
    }
}
