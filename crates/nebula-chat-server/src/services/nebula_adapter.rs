use tracing::{error, info, warn};

use super::conversation::SessionStore;
use super::nebula_client::{ChatBackend, NebulaError, NebulaRequest};
use crate::models::chat::ChatMessage;
use crate::utils::text::preview;

/// Prefix of the reply text returned when the remote call fails
pub const NEBULA_ERROR_PREFIX: &str = "Error communicating with Nebula API";

/// Stateful proxy between the HTTP handlers and the Nebula chat API.
///
/// Owns the session store: each call sends the session's prior history as
/// context, then records the new user/assistant pair.
pub struct NebulaAdapter {
    backend: Box<dyn ChatBackend>,
    store: SessionStore,
}

impl NebulaAdapter {
    /// Create adapter over a backend and an injected session store
    pub fn new(backend: Box<dyn ChatBackend>, store: SessionStore) -> Self {
        info!("NebulaAdapter initialized");
        Self { backend, store }
    }

    /// Reply text for `message`. Remote failures come back as
    /// `"Error communicating with Nebula API: ..."` instead of an error,
    /// and leave the session history untouched.
    pub async fn generate_response(&self, message: &str, session_id: &str) -> String {
        match self.try_generate_response(message, session_id).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error in generate_response (session: {}): {}", session_id, e);
                format!("{}: {}", NEBULA_ERROR_PREFIX, e)
            }
        }
    }

    /// Same exchange as [`generate_response`](Self::generate_response), with the
    /// remote failure returned as a typed error. The session lock is held until
    /// the pair is recorded.
    pub async fn try_generate_response(
        &self,
        message: &str,
        session_id: &str,
    ) -> Result<String, NebulaError> {
        info!(
            "Generating response for message: {}... (session: {})",
            preview(message, 30),
            session_id
        );

        let session = self.store.session(session_id);
        let mut transcript = session.lock().await;

        let request = NebulaRequest::new(message, transcript.messages().to_vec());
        let reply = self.backend.chat(request).await?;
        let text = reply.text().to_owned();

        info!("Extracted AI response: {}...", preview(&text, 50));
        if text.is_empty() {
            warn!("Empty response from Nebula API (session: {}): {:?}", session_id, reply);
        }

        let dropped = transcript.push_exchange(message, &text);
        if dropped > 0 {
            info!(
                "Trimmed session {} history to last {} messages",
                session_id,
                transcript.max_messages()
            );
        }

        Ok(text)
    }

    /// Snapshot of a session's transcript, empty when unknown
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.store.snapshot(session_id).await
    }

    /// Number of sessions seen so far
    pub fn session_count(&self) -> usize {
        self.store.len()
    }
}
