pub mod chat;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, Role, SessionId, SessionStats};
