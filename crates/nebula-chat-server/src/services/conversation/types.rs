use crate::models::chat::ChatMessage;

/// Default cap: 10 user/assistant exchanges
pub const DEFAULT_MAX_MESSAGES: usize = 20;

/// Largest cap accepted from configuration
pub const MAX_HISTORY_LIMIT: usize = 1_000;

/// Ordered, bounded message history for one session.
///
/// Records are only ever appended in user/assistant pairs, and the cap is
/// forced to an even number, so the length stays even after every exchange.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl Transcript {
    /// Create an empty transcript. Storage grows with the history, never
    /// past the default window up front.
    pub fn new(max_messages: usize) -> Self {
        let max_messages = normalize_cap(max_messages);
        Self {
            messages: Vec::with_capacity(max_messages.min(DEFAULT_MAX_MESSAGES) + 2),
            max_messages,
        }
    }

    /// Records, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of records (not exchanges)
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Effective cap after normalization
    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Number of user + assistant pairs
    pub fn exchange_count(&self) -> usize {
        self.messages.len() / 2
    }

    /// Append one exchange, then drop the oldest records past the cap.
    /// Returns how many records were discarded.
    pub fn push_exchange(&mut self, user: &str, assistant: &str) -> usize {
        self.messages.push(ChatMessage::user(user));
        self.messages.push(ChatMessage::assistant(assistant));

        let excess = self.messages.len().saturating_sub(self.max_messages);
        if excess > 0 {
            self.messages.drain(..excess);
        }
        excess
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

/// Round down to even, minimum one exchange
pub fn normalize_cap(max_messages: usize) -> usize {
    (max_messages - max_messages % 2).max(2)
}
