//! Optional fire-and-forget canvas-rendering effects (spec §6).
//!
//! These are UI side-effects (status colors, error annotations) the host surfaces
//! on the canvas; the core never waits on them and they must be idempotent under
//! retries (a dropped or duplicated call is harmless).

use async_trait::async_trait;

#[async_trait]
pub trait CanvasEffects: Send + Sync {
    async fn change_node_color(&self, _id: &str, _code: &str) {}
    async fn change_node_text(&self, _id: &str, _text: &str) {}
    async fn add_error_node(&self, _id: &str, _message: &str) {}
    async fn add_warning_node(&self, _id: &str, _message: &str) {}
}

/// Effects implementation that does nothing; the default when a host doesn't care
/// about canvas rendering (e.g. headless runs, tests).
pub struct NoopCanvasEffects;

#[async_trait]
impl CanvasEffects for NoopCanvasEffects {}
