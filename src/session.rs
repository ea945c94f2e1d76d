//! Per-user session state: the analysed document, its last report and an
//! append-only chat log.
//!
//! A [`Session`] is owned by exactly one user interaction and passed into
//! every pipeline call that needs it. [`SessionStore`] keeps many of them
//! isolated by id for servers that handle several users at once.

use crate::error::GuardError;
use crate::output::AnalysisOutput;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// State for one user interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    messages: Vec<ChatMessage>,
    /// The most recent analysis; follow-up questions are answered against it.
    pub analysis: Option<AnalysisOutput>,
}

impl Session {
    /// A fresh session with a random v4 id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            analysis: None,
        }
    }

    /// Append a message to the end of the log.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drop every message. The analysis is kept.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Iterate over a snapshot of the log, oldest first.
    ///
    /// The returned iterator is `Clone`, so it can be restarted.
    pub fn list(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a new analysis. A new upload starts a new conversation.
    pub fn set_analysis(&mut self, output: AnalysisOutput) {
        self.analysis = Some(output);
        self.messages.clear();
    }
}

/// Concurrent, per-id session map. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and store a new session, returning its id.
    pub fn create(&self) -> String {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        id
    }

    pub fn insert(&self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    /// A copy of the session's current state.
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    /// Mutate one session in place. Other sessions are never touched.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Result<R, GuardError> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| GuardError::SessionNotFound(id.to_string()))?;
        Ok(f(entry.value_mut()))
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
