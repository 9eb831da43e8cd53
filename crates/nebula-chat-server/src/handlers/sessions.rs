use axum::{extract::State, Json};

use crate::models::chat::SessionStats;
use crate::state::AppState;

pub async fn session_stats_handler(State(state): State<AppState>) -> Json<SessionStats> {
    Json(SessionStats {
        nebula_sessions: state.nebula.session_count(),
        agent_sessions: state.agent.as_ref().map_or(0, |a| a.session_count()),
    })
}
