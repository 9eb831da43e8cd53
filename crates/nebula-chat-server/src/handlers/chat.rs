use crate::models::chat::{ChatRequest, ChatResponse};
use crate::services::{AgentService, NebulaAdapter};
use crate::utils::error::ApiError;
use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::AppJson;

pub async fn nebula_chat_handler(
    State(nebula): State<Arc<NebulaAdapter>>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let start_time = Instant::now();

    info!(
        "Nebula chat request: session={}, message_len={}",
        request.session_id,
        request.message.len()
    );

    let response = nebula
        .generate_response(&request.message, &request.session_id)
        .await;

    info!("Nebula chat completed in {}ms", start_time.elapsed().as_millis());
    Ok(Json(ChatResponse { response }))
}

pub async fn agent_chat_handler(
    State(agent): State<Option<Arc<AgentService>>>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let agent = agent.ok_or_else(|| ApiError::NotFound("Agent mode is disabled".to_string()))?;
    let start_time = Instant::now();

    info!(
        "Agent chat request: session={}, message_len={}",
        request.session_id,
        request.message.len()
    );

    let response = agent.respond(&request.message, &request.session_id).await;

    info!("Agent chat completed in {}ms", start_time.elapsed().as_millis());
    Ok(Json(ChatResponse { response }))
}
