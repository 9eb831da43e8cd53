use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::state::AppState;
use crate::utils::error::panic_response;

pub fn build_router(state: AppState) -> Router {
    // Public routes
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let api_routes = Router::new()
        .route("/api/nebula-chat", post(handlers::chat::nebula_chat_handler))
        .route("/api/agent-chat", post(handlers::chat::agent_chat_handler))
        .route(
            "/api/sessions/stats",
            get(handlers::sessions::session_stats_handler),
        );

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        // The frontend is served from another origin
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
}
