use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ready,
    Disabled,
}

/// Which chat routes can be served, and how many sessions each holds
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub nebula: ComponentStatus,
    pub agent: ComponentStatus,
    pub nebula_sessions: usize,
    pub agent_sessions: usize,
}

pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Settings are validated before the router exists, so the Nebula route is
/// always up; the agent route only when agent mode was configured.
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let (agent, agent_sessions) = match &state.agent {
        Some(agent) => (ComponentStatus::Ready, agent.session_count()),
        None => (ComponentStatus::Disabled, 0),
    };

    Json(ReadinessResponse {
        nebula: ComponentStatus::Ready,
        agent,
        nebula_sessions: state.nebula.session_count(),
        agent_sessions,
    })
}
