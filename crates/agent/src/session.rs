//! Session manager: per-session history around a run.

use parley_core::message::{SessionId, Turn};
use parley_core::store::TurnStore;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TurnStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TurnStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Load the history a run starts from. With `clean_history` the session
    /// is cleared first, so the result is always empty.
    pub async fn prepare(
        &self,
        session: &SessionId,
        clean_history: bool,
    ) -> parley_core::Result<Vec<Turn>> {
        if clean_history {
            debug!(session = %session, "Clearing history before run");
            self.store.clear(session).await?;
        }
        Ok(self.store.load(session).await?)
    }

    /// Append one completed exchange: the user turn, then the reply.
    pub async fn record(
        &self,
        session: &SessionId,
        user_text: &str,
        assistant_text: &str,
    ) -> parley_core::Result<()> {
        self.store
            .append_exchange(session, Turn::user(user_text), Turn::assistant(assistant_text))
            .await?;
        Ok(())
    }

    pub async fn history(&self, session: &SessionId) -> parley_core::Result<Vec<Turn>> {
        Ok(self.store.load(session).await?)
    }

    pub async fn clear(&self, session: &SessionId) -> parley_core::Result<()> {
        self.store.clear(session).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Role;
    use parley_store::InMemoryTurnStore;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryTurnStore::new()))
    }

    #[tokio::test]
    async fn record_appends_user_then_assistant() {
        let sessions = manager();
        let id = SessionId::from("s1");

        sessions.record(&id, "hello", "hi there").await.unwrap();
        sessions.record(&id, "again", "sure").await.unwrap();

        let turns = sessions.history(&id).await.unwrap();
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(turns[2].text, "again");
    }

    #[tokio::test]
    async fn prepare_with_clean_history_is_empty() {
        let sessions = manager();
        let id = SessionId::from("s1");
        sessions.record(&id, "hello", "hi").await.unwrap();

        assert_eq!(sessions.prepare(&id, false).await.unwrap().len(), 2);
        assert!(sessions.prepare(&id, true).await.unwrap().is_empty());
        assert!(sessions.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let sessions = manager();
        sessions.record(&"a".into(), "one", "1").await.unwrap();
        sessions.clear(&"b".into()).await.unwrap();

        assert_eq!(sessions.history(&"a".into()).await.unwrap().len(), 2);
        assert!(sessions.history(&"b".into()).await.unwrap().is_empty());
    }
}
