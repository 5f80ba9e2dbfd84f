//! `parley ingest`: load text files into the document store.

use parley_core::search::NewDocument;
use std::path::PathBuf;
use tracing::warn;

use super::runtime;

/// Build a document from a file's text and its metadata.
pub fn document_for(path: &std::path::Path, content: String, category: Option<&str>) -> NewDocument {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "source".into(),
        serde_json::Value::String(path.display().to_string()),
    );
    if let Some(category) = category {
        metadata.insert(
            "category".into(),
            serde_json::Value::String(category.to_string()),
        );
    }
    NewDocument { content, metadata }
}

pub async fn run(files: &[PathBuf], category: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config()?;
    if config.store.backend == "memory" {
        warn!("store.backend is \"memory\": ingested documents last only for this process");
    }

    let client = runtime::build_client(&config)?;
    let (_, pool) = runtime::open_stores(&config).await?;
    let store = runtime::open_documents(&config, pool, client).await?;

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        if content.trim().is_empty() {
            warn!(file = %path.display(), "Skipping empty file");
            continue;
        }
        documents.push(document_for(path, content, category.as_deref()));
    }

    let stored = store.add_documents(documents).await?;
    println!("Ingested {stored} document(s) into '{}'.", config.retrieval.collection);
    Ok(())
}
