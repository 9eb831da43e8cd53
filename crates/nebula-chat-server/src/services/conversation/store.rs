use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::{normalize_cap, Transcript};
use crate::models::chat::{ChatMessage, SessionId};

/// Handle to one session's transcript. Hold the lock for the whole
/// read-call-append sequence so same-session requests are serialized.
pub type SessionHandle = Arc<Mutex<Transcript>>;

/// Thread-safe in-memory session store.
///
/// DashMap shards the key space so different sessions never contend; each
/// entry carries its own async mutex. Sessions are created lazily and live
/// for the lifetime of the store.
#[derive(Clone)]
pub struct SessionStore {
    /// session_id -> transcript
    sessions: Arc<DashMap<SessionId, SessionHandle>>,
    max_messages: usize,
}

impl SessionStore {
    /// Create an empty store; `max_messages` is normalized to an even cap
    pub fn new(max_messages: usize) -> Self {
        let max_messages = normalize_cap(max_messages);
        info!("Initializing session store (max {} messages per session)", max_messages);
        Self {
            sessions: Arc::new(DashMap::new()),
            max_messages,
        }
    }

    /// Get-or-create the transcript handle for `session_id`
    pub fn session(&self, session_id: &str) -> SessionHandle {
        if let Some(entry) = self.sessions.get(session_id) {
            return entry.value().clone();
        }

        match self.sessions.entry(session_id.to_owned()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                info!("Created new session: {}", session_id);
                let handle = Arc::new(Mutex::new(Transcript::new(self.max_messages)));
                entry.insert(handle.clone());
                handle
            }
        }
    }

    /// Copy of a session's records; empty for unknown sessions (does not create one)
    pub async fn snapshot(&self, session_id: &str) -> Vec<ChatMessage> {
        let handle = self.sessions.get(session_id).map(|e| e.value().clone());
        match handle {
            Some(handle) => handle.lock().await.messages().to_vec(),
            None => {
                debug!("Snapshot requested for unknown session {}", session_id);
                Vec::new()
            }
        }
    }

    /// Check if a session has been created
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Number of known sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no session exists yet
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Per-session record cap
    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(super::types::DEFAULT_MAX_MESSAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_created_lazily() {
        let store = SessionStore::default();
        assert!(store.is_empty());
        assert!(store.snapshot("s1").await.is_empty());
        assert!(!store.contains("s1"));

        let handle = store.session("s1");
        assert!(handle.lock().await.is_empty());
        assert!(store.contains("s1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_key_returns_same_transcript() {
        let store = SessionStore::default();
        store.session("s1").lock().await.push_exchange("q", "a");

        let again = store.session("s1");
        assert_eq!(again.lock().await.len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::default();
        store.session("A").lock().await.push_exchange("for A", "reply A");
        store.session("B");

        assert_eq!(store.snapshot("A").await.len(), 2);
        assert!(store.snapshot("B").await.is_empty());
    }

    #[test]
    fn test_odd_cap_is_rounded_down() {
        assert_eq!(SessionStore::new(5).max_messages(), 4);
    }
}
