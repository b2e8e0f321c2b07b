//! In-memory backend, useful for testing and ephemeral deployments.

use async_trait::async_trait;
use lorecall_core::{Session, SessionError, SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Stores sessions in a HashMap behind an async RwLock.
/// Everything is lost on restart; persistence belongs to another backend.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Result<Session, SessionError> {
        let session = Session::new();
        debug!(session_id = %session.id, "Created session");
        self.sessions
            .write()
            .await
            .insert(session.id.0.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id.0)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.0.clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.id.0.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&id.0);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionId>, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .keys()
            .map(|k| SessionId::from(k))
            .collect())
    }
}
