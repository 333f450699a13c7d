//! Conversation session store
//!
//! Optional collaborator used by the ingress side of the system; the
//! scheduler itself never touches it.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::llm::MessageRole;

/// One entry in a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEntry {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Append-only conversation history keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    async fn append(&self, session_id: &str, entry: SessionEntry) -> Result<(), DomainError>;

    /// Entries for a session in insertion order; empty for unknown sessions
    async fn get(&self, session_id: &str) -> Result<Vec<SessionEntry>, DomainError>;
}
