use axum::extract::FromRef;
use std::sync::Arc;

use crate::services::{AgentService, NebulaAdapter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub nebula: Arc<NebulaAdapter>,
    /// None when agent mode is disabled
    pub agent: Option<Arc<AgentService>>,
}

impl FromRef<AppState> for Arc<NebulaAdapter> {
    fn from_ref(state: &AppState) -> Self {
        state.nebula.clone()
    }
}

impl FromRef<AppState> for Option<Arc<AgentService>> {
    fn from_ref(state: &AppState) -> Self {
        state.agent.clone()
    }
}
