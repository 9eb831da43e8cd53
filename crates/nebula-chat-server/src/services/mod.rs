pub mod agent_service;
pub mod conversation;
pub mod nebula_adapter;
pub mod nebula_client;

pub use agent_service::AgentService;
pub use conversation::SessionStore;
pub use nebula_adapter::NebulaAdapter;
pub use nebula_client::{ChatBackend, NebulaClient};
