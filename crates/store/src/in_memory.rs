//! In-memory turn store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use parley_core::error::StoreError;
use parley_core::message::{SessionId, Turn};
use parley_core::store::TurnStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A turn store that keeps every session in a HashMap.
/// Nothing survives the process.
pub struct InMemoryTurnStore {
    sessions: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
}

impl InMemoryTurnStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of sessions with at least one turn.
    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|turns| !turns.is_empty())
            .count()
    }
}

impl Default for InMemoryTurnStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnStore for InMemoryTurnStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, session: &SessionId) -> Result<Vec<Turn>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session.as_str()).cloned().unwrap_or_default())
    }

    async fn append(&self, session: &SessionId, turn: Turn) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.as_str().to_string())
            .or_default()
            .push(turn);
        Ok(())
    }

    // Both turns land under one write lock, so readers never see half an exchange.
    async fn append_exchange(
        &self,
        session: &SessionId,
        user: Turn,
        assistant: Turn,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(session.as_str().to_string()).or_default();
        turns.push(user);
        turns.push(assistant);
        Ok(())
    }

    async fn clear(&self, session: &SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(session.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Role;

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let store = InMemoryTurnStore::new();
        let turns = store.load(&SessionId::from("nobody")).await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn exchange_appends_user_then_assistant() {
        let store = InMemoryTurnStore::new();
        let session = SessionId::from("s1");
        store.append(&session, Turn::user("earlier")).await.unwrap();

        store
            .append_exchange(&session, Turn::user("hi"), Turn::assistant("hello"))
            .await
            .unwrap();

        let turns = store.load(&session).await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].text, "hi");
        assert_eq!(turns[2].role, Role::Assistant);
        assert_eq!(turns[2].text, "hello");
    }

    #[tokio::test]
    async fn clear_then_load_is_empty() {
        let store = InMemoryTurnStore::new();
        let session = SessionId::from("s1");
        store
            .append_exchange(&session, Turn::user("a"), Turn::assistant("b"))
            .await
            .unwrap();

        store.clear(&session).await.unwrap();
        assert!(store.load(&session).await.unwrap().is_empty());
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryTurnStore::new();
        store
            .append(&SessionId::from("a"), Turn::user("for a"))
            .await
            .unwrap();
        store
            .append(&SessionId::from("b"), Turn::user("for b"))
            .await
            .unwrap();

        store.clear(&SessionId::from("a")).await.unwrap();
        let b = store.load(&SessionId::from("b")).await.unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].text, "for b");
    }
}
