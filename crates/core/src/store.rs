//! Turn store trait: persistent per-session conversation history.
//!
//! Turns are kept in append order per session id. That order is the only
//! consistency guarantee: concurrent writers to one session are not
//! reconciled.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{SessionId, Turn};

/// The core TurnStore trait.
///
/// Implementations: SQLite, in-memory (for tests and ephemeral sessions).
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Load a session's turns in append order. Unknown sessions are empty.
    async fn load(&self, session: &SessionId) -> std::result::Result<Vec<Turn>, StoreError>;

    /// Append a single turn to a session.
    async fn append(&self, session: &SessionId, turn: Turn) -> std::result::Result<(), StoreError>;

    /// Append a user turn followed by its assistant reply.
    ///
    /// The default appends them one after the other, user first, so a
    /// reader never sees a reply without its prompt. Backends with
    /// transactions should override this to write both atomically.
    async fn append_exchange(
        &self,
        session: &SessionId,
        user: Turn,
        assistant: Turn,
    ) -> std::result::Result<(), StoreError> {
        self.append(session, user).await?;
        self.append(session, assistant).await
    }

    /// Remove every turn of a session.
    async fn clear(&self, session: &SessionId) -> std::result::Result<(), StoreError>;
}
