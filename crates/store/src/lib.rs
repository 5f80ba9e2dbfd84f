//! Storage implementations for Parley.
//!
//! - Turn stores: in-memory and SQLite
//! - Document similarity search over SQLite with embeddings from the completion backend
//! - A read-mostly SQLite database for text-to-SQL analytics

pub mod analytics;
pub mod in_memory;
pub mod sqlite;
pub mod vector;

pub use analytics::SqliteDatabase;
pub use in_memory::InMemoryTurnStore;
pub use sqlite::{SqliteTurnStore, open_pool};
pub use vector::{SqliteVectorStore, cosine_similarity};

pub use sqlx::SqlitePool;
