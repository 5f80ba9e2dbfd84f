//! Document similarity search backed by SQLite.
//!
//! Documents are stored with their embedding as a little-endian f32 BLOB.
//! Queries embed the question through the completion backend, then rank
//! every document of the collection by cosine similarity.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::provider::CompletionClient;
use parley_core::search::{NewDocument, ScoredDocument, VectorStore};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the vectors differ in length or either is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// A vector store over a `documents` table.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn CompletionClient>,
    embedding_model: String,
    collection: String,
}

impl SqliteVectorStore {
    /// Create the store on an open pool and run its migrations.
    pub async fn new(
        pool: SqlitePool,
        embedder: Arc<dyn CompletionClient>,
        embedding_model: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let store = Self {
            pool,
            embedder,
            embedding_model: embedding_model.into(),
            collection: collection.into(),
        };
        store.run_migrations().await?;
        info!(collection = %store.collection, "SQLite vector store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id          TEXT PRIMARY KEY,
                collection  TEXT NOT NULL,
                content     TEXT NOT NULL,
                metadata    TEXT NOT NULL DEFAULT '{}',
                embedding   BLOB NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("documents table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("collection index: {e}")))?;

        Ok(())
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, StoreError> {
        self.embedder
            .embed(&self.embedding_model, texts)
            .await
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))
    }

    /// Number of documents in this collection.
    pub async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?1")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Count: {e}")))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add_documents(&self, documents: Vec<NewDocument>) -> Result<usize, StoreError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embed(texts).await?;
        if embeddings.len() != documents.len() {
            return Err(StoreError::EmbeddingFailed(format!(
                "Expected {} embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        let now = chrono::Utc::now().to_rfc3339();
        for (doc, embedding) in documents.iter().zip(embeddings.iter()) {
            let metadata = serde_json::to_string(&doc.metadata)
                .map_err(|e| StoreError::Storage(format!("Metadata serialization: {e}")))?;

            sqlx::query(
                r#"
                INSERT INTO documents (id, collection, content, metadata, embedding, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&self.collection)
            .bind(&doc.content)
            .bind(&metadata)
            .bind(embedding_to_blob(embedding))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(count = documents.len(), collection = %self.collection, "Stored documents");
        Ok(documents.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::EmbeddingFailed("No embedding for query".into()))?;

        let rows = sqlx::query(
            "SELECT content, metadata, embedding FROM documents WHERE collection = ?1",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Vector scan: {e}")))?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let content: String = row
                .try_get("content")
                .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
            let metadata: String = row
                .try_get("metadata")
                .map_err(|e| StoreError::QueryFailed(format!("metadata column: {e}")))?;
            let blob: Vec<u8> = row
                .try_get("embedding")
                .map_err(|e| StoreError::QueryFailed(format!("embedding column: {e}")))?;

            scored.push(ScoredDocument {
                content,
                metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                score: cosine_similarity(&blob_to_embedding(&blob), &query_embedding),
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
