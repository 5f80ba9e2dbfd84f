//! SQLite turn store.
//!
//! A single `turns` table keyed by session id. Append order is the
//! autoincrement id, so `load` reads turns back exactly as they were written.

use async_trait::async_trait;
use chrono::Utc;
use parley_core::error::StoreError;
use parley_core::message::{Role, SessionId, Turn};
use parley_core::store::TurnStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Open a SQLite pool for a file path, a `sqlite:` URL, or `":memory:"`.
///
/// Missing database files (and their parent directories) are created.
pub async fn open_pool(path: &str) -> Result<SqlitePool, StoreError> {
    let in_memory = path == ":memory:" || path.contains("mode=memory");
    let options = if path == ":memory:" || path.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
    } else {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        SqliteConnectOptions::new().filename(path)
    };

    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    // Every connection to an in-memory database sees its own copy, so those
    // pools hold exactly one connection for their whole life.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };

    pool_options
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))
}

/// A persistent turn store backed by SQLite.
pub struct SqliteTurnStore {
    pool: SqlitePool,
}

impl SqliteTurnStore {
    /// Open (or create) the store at `path`. Pass `":memory:"` for an
    /// ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let pool = open_pool(path).await?;
        let store = Self::from_pool(pool).await?;
        info!("SQLite turn store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (shared with the vector store).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                role        TEXT NOT NULL,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("session index: {e}")))?;

        debug!("Turn store migrations complete");
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let role: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let role = Role::from_str(&role).map_err(StoreError::QueryFailed)?;
        let timestamp = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Turn {
            role,
            text,
            timestamp,
        })
    }

    async fn insert<'e, E>(executor: E, session: &SessionId, turn: &Turn) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            "INSERT INTO turns (session_id, role, text, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.text)
        .bind(turn.timestamp.to_rfc3339())
        .execute(executor)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl TurnStore for SqliteTurnStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, session: &SessionId) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT role, text, created_at FROM turns WHERE session_id = ?1 ORDER BY id ASC",
        )
        .bind(session.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Load turns: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn append(&self, session: &SessionId, turn: Turn) -> Result<(), StoreError> {
        Self::insert(&self.pool, session, &turn).await
    }

    async fn append_exchange(
        &self,
        session: &SessionId,
        user: Turn,
        assistant: Turn,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        Self::insert(&mut *tx, session, &user).await?;
        Self::insert(&mut *tx, session, &assistant).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(session = %session, "Recorded exchange");
        Ok(())
    }

    async fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM turns WHERE session_id = ?1")
            .bind(session.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE failed: {e}")))?;

        debug!(session = %session, removed = result.rows_affected(), "Cleared session");
        Ok(())
    }
}
