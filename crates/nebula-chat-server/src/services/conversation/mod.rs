//! Conversation memory management module
//!
//! Provides in-memory per-session transcripts:
//! - Thread-safe session store (DashMap, one async lock per session)
//! - Bounded history with oldest-first trimming

mod store;
pub mod types;

pub use store::{SessionHandle, SessionStore};
pub use types::{Transcript, DEFAULT_MAX_MESSAGES, MAX_HISTORY_LIMIT};

pub use crate::models::chat::{ChatMessage, SessionId};
