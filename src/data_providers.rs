//! Optional data-query collaborators invoked during reference rendering (spec §6,
//! §4.8 step 4).

use crate::error::CannoliResult;
use async_trait::async_trait;

/// A single semantic-search hit.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub similarity: f32,
    pub path: String,
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Renders a `dataview`-style query block to markdown.
    async fn dataview_query_markdown(&self, query: &str) -> CannoliResult<String>;

    /// Runs a `smart-connections`-style semantic search.
    async fn semantic_search(&self, query: &str) -> CannoliResult<Vec<SemanticHit>>;
}
