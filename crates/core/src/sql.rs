//! Relational query collaborator used by analytics.

use async_trait::async_trait;
use crate::error::StoreError;

/// A SQL database the analytics strategy can describe and query.
#[async_trait]
pub trait SqlDatabase: Send + Sync {
    /// SQL dialect name put into text-to-SQL prompts (e.g., "sqlite").
    fn dialect(&self) -> &str;

    /// Schema plus a few sample rows for every table the model may use.
    async fn table_info(&self) -> std::result::Result<String, StoreError>;

    /// Execute a query and render the result rows as text.
    async fn run(&self, sql: &str) -> std::result::Result<String, StoreError>;
}
