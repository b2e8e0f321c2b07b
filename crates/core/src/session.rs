//! Session and conversation-turn domain types.
//!
//! A session is the durable record of one conversation: an ordered list of
//! turns plus bookkeeping timestamps. Turns hold finished content only; the
//! streaming machinery never writes partial blocks here.

use crate::error::SessionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user.
    User,
    /// The model's answer (or best-effort prose on a degraded run).
    Assistant,
    /// Rendered tool outcomes fed back to the model.
    ToolResults,
}

/// A single turn in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tools invoked while producing this turn (assistant turns only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,

    /// Rough token estimate (4 chars per token)
    pub token_count: u32,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    fn make(role: Role, content: String, tools_used: Vec<String>) -> Self {
        let token_count = (content.len() / 4) as u32;
        Self {
            role,
            content,
            tools_used,
            token_count,
            created_at: Utc::now(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::make(Role::User, content.into(), Vec::new())
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>, tools_used: Vec<String>) -> Self {
        Self::make(Role::Assistant, content.into(), tools_used)
    }

    /// Create a tool-results turn.
    pub fn tool_results(content: impl Into<String>, tools_used: Vec<String>) -> Self {
        Self::make(Role::ToolResults, content.into(), tools_used)
    }
}

/// A conversation session: ordered turns with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// Ordered turns
    pub turns: Vec<ConversationTurn>,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a turn to the session.
    pub fn push_turn(&mut self, turn: ConversationTurn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Total token count estimate across all turns.
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(|t| t.token_count as usize).sum()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Session persistence.
///
/// Stores hand out owned snapshots. The orchestrator mutates its copy while
/// a run is in flight and writes it back with [`SessionStore::save`], so a
/// crashed run never leaves half a turn behind.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create and persist a fresh session.
    async fn create(&self) -> Result<Session, SessionError>;

    /// Fetch a session by id.
    async fn get(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// Persist the current state of a session.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn delete(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Ids of all stored sessions.
    async fn list(&self) -> Result<Vec<SessionId>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = ConversationTurn::user("How does the cache work?");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "How does the cache work?");
        assert!(turn.tools_used.is_empty());
        assert_eq!(turn.token_count, 6);
    }

    #[test]
    fn assistant_turn_records_tools() {
        let turn =
            ConversationTurn::assistant("The cache uses LRU.", vec!["semantic_search".into()]);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.tools_used, vec!["semantic_search".to_string()]);
    }

    #[test]
    fn session_tracks_updates() {
        let mut session = Session::new();
        let created = session.created_at;

        session.push_turn(ConversationTurn::user("First message"));
        assert_eq!(session.turns.len(), 1);
        assert!(session.updated_at >= created);
    }

    #[test]
    fn session_token_estimate() {
        let mut session = Session::new();
        // 20 chars = 5 tokens
        session.push_turn(ConversationTurn::user("12345678901234567890"));
        assert_eq!(session.estimated_tokens(), 5);
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = ConversationTurn::tool_results("results here", vec!["regex_search".into()]);
        let json = serde_json::to_string(&turn).unwrap();
        let deserialized: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.role, Role::ToolResults);
        assert_eq!(deserialized.content, "results here");
    }
}
