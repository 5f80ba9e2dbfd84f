//! Built-in tool implementations for Parley.
//!
//! Tools give the agent the ability to look things up:
//! search the web, search ingested documents, and run analytics queries.

pub mod analytics_qa;
pub mod document_search;
pub mod web_search;

pub use analytics_qa::{AnalyticsQaTool, clean_sql};
pub use document_search::{DocumentSearchTool, render_hits};
pub use web_search::{DuckDuckGoSearch, WebSearchTool};

use parley_core::search::{VectorStore, WebSearch};
use parley_core::tool::ToolRegistry;
use std::sync::Arc;

/// Collaborators the built-in tools need. A tool is registered only when
/// its collaborator is present.
#[derive(Default)]
pub struct ToolDeps {
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub documents: Option<Arc<dyn VectorStore>>,
    pub top_k: usize,
    pub analytics: Option<AnalyticsQaTool>,
}

/// Create a tool registry with every built-in tool whose collaborator is available.
pub fn default_registry(deps: ToolDeps) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if let Some(search) = deps.web_search {
        registry.register(Box::new(WebSearchTool::new(search)));
    }
    if let Some(store) = deps.documents {
        registry.register(Box::new(DocumentSearchTool::new(store, deps.top_k.max(1))));
    }
    if let Some(analytics) = deps.analytics {
        registry.register(Box::new(analytics));
    }

    tracing::debug!(tools = ?registry.names(), "Built tool registry");
    registry
}
