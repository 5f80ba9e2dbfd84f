//! Document search tool: similarity search over ingested documents.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::search::{ScoredDocument, VectorStore};
use parley_core::tool::Tool;
use serde::Serialize;
use std::sync::Arc;

/// One hit as shown to the model.
#[derive(Debug, Serialize)]
struct Hit<'a> {
    score: f32,
    page_content: &'a str,
    metadata: &'a serde_json::Map<String, serde_json::Value>,
}

/// Render hits as a JSON array of `{score, page_content, metadata}`.
pub fn render_hits(docs: &[ScoredDocument]) -> Result<String, serde_json::Error> {
    let hits: Vec<Hit<'_>> = docs
        .iter()
        .map(|d| Hit {
            score: d.score,
            page_content: &d.content,
            metadata: &d.metadata,
        })
        .collect();
    serde_json::to_string(&hits)
}

pub struct DocumentSearchTool {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl DocumentSearchTool {
    pub fn new(store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }
}

#[async_trait]
impl Tool for DocumentSearchTool {
    fn name(&self) -> &str {
        "DocumentSearch"
    }

    fn description(&self) -> &str {
        "Use this tool when you need information from the local document store, such as CVs or reports. \
         For example, projects mentioned in a CV or the university a candidate attended. \
         The input is a natural language search query."
    }

    fn fallback_error(&self) -> &str {
        "Sorry, I couldn't find any relevant information in the document store. Please try asking a different question."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("Empty document query".into()));
        }

        let docs = self
            .store
            .similarity_search(query, self.top_k)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?;

        if docs.is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("No documents matched '{query}'"),
            });
        }

        render_hits(&docs).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::StoreError;
    use parley_core::search::NewDocument;
    use std::sync::Mutex;

    struct FixedStore {
        docs: Vec<ScoredDocument>,
        seen_k: Mutex<Option<usize>>,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn add_documents(&self, documents: Vec<NewDocument>) -> Result<usize, StoreError> {
            Ok(documents.len())
        }

        async fn similarity_search(
            &self,
            _query: &str,
            k: usize,
        ) -> Result<Vec<ScoredDocument>, StoreError> {
            *self.seen_k.lock().unwrap() = Some(k);
            Ok(self.docs.iter().take(k).cloned().collect())
        }
    }

    fn scored(content: &str, score: f32) -> ScoredDocument {
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!("alice_cv.txt"));
        ScoredDocument {
            content: content.into(),
            metadata,
            score,
        }
    }

    #[tokio::test]
    async fn returns_json_hits_limited_to_top_k() {
        let store = Arc::new(FixedStore {
            docs: vec![scored("ETH Zurich, MSc", 0.9), scored("Rust, Go", 0.7), scored("x", 0.1)],
            seen_k: Mutex::new(None),
        });
        let tool = DocumentSearchTool::new(store.clone(), 2);

        let out = tool.invoke("where did Alice study").await.unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["page_content"], "ETH Zurich, MSc");
        assert_eq!(parsed[0]["metadata"]["source"], "alice_cv.txt");
        assert_eq!(*store.seen_k.lock().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn no_hits_is_a_tool_failure() {
        let store = Arc::new(FixedStore {
            docs: Vec::new(),
            seen_k: Mutex::new(None),
        });
        let tool = DocumentSearchTool::new(store, 5);
        assert!(tool.invoke("anything").await.is_err());
        assert!(tool.fallback_error().contains("document store"));
    }
}
