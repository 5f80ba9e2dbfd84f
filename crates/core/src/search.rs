//! Search collaborators: vector similarity search and web search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::{StoreError, ToolError};

/// A document returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The document text
    pub content: String,

    /// Free-form metadata (source file, category, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Similarity to the query (higher is closer)
    #[serde(default)]
    pub score: f32,
}

/// A document to be added to a vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Similarity search over an embedded document collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The backend name (e.g., "sqlite").
    fn name(&self) -> &str;

    /// Embed and store documents. Returns the number stored.
    async fn add_documents(&self, documents: Vec<NewDocument>) -> std::result::Result<usize, StoreError>;

    /// Return the `k` documents closest to `query`, closest first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<ScoredDocument>, StoreError>;
}

/// A web search service returning a text digest of results.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> std::result::Result<String, ToolError>;
}
