//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent look things up: search the web, search the
//! document store, or run analytics queries. A tool takes plain text input
//! and returns a plain text observation; it never touches session or loop
//! state directly.

use async_trait::async_trait;
use std::collections::BTreeMap;
use crate::error::ToolError;

/// Observation used for a failed tool that has no fallback text of its own.
pub const DEFAULT_TOOL_FALLBACK: &str =
    "The tool failed to produce a result. Try a different tool or answer without it.";

/// The core Tool trait.
///
/// Each tool (web search, document search, analytics) implements this trait.
/// Tools are registered in the ToolRegistry at startup and made available to
/// the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "WebSearch").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Observation fed to the model when `invoke` fails.
    ///
    /// The raw error detail never reaches the model context.
    fn fallback_error(&self) -> &str {
        DEFAULT_TOOL_FALLBACK
    }

    /// Invoke the tool with the model-supplied input.
    async fn invoke(&self, input: &str) -> std::result::Result<String, ToolError>;
}

/// A registry of available tools.
///
/// Built once at startup with [`ToolRegistry::register`], then shared behind
/// an `Arc` so it is read-only for every run. Tools are kept in name order so
/// the rendered catalogue is stable between runs.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    /// Builder-style registration.
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, in name order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool catalogue for a system prompt, one `name: description` per line.
    pub fn catalogue(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Invoke a tool by name.
    pub async fn invoke(&self, name: &str, input: &str) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.invoke(input).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
