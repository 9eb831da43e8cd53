pub mod settings;

pub use settings::{AgentConfig, ConversationConfig, NebulaConfig, ServerConfig, Settings};
