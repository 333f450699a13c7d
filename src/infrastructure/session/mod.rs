//! In-memory session store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::DomainError;
use crate::domain::session::{SessionEntry, SessionStore};

/// Session history held in process memory; gone on restart
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, session_id: &str, entry: SessionEntry) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().push(entry);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Vec<SessionEntry>, DomainError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MessageRole;

    #[tokio::test]
    async fn test_append_and_get_in_order() {
        let store = InMemorySessionStore::new();

        store
            .append("s1", SessionEntry::user("first question"))
            .await
            .unwrap();
        store
            .append("s1", SessionEntry::assistant("first answer"))
            .await
            .unwrap();

        let entries = store.get("s1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, MessageRole::User);
        assert_eq!(entries[1].content, "first answer");
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemorySessionStore::new();
        assert!(store.get("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();

        store.append("a", SessionEntry::user("for a")).await.unwrap();
        store.append("b", SessionEntry::user("for b")).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().len(), 1);
        assert_eq!(store.get("b").await.unwrap().len(), 1);
    }
}
