use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use nebula_chat_server::config::Settings;
use nebula_chat_server::router::build_router;
use nebula_chat_server::services::{AgentService, NebulaAdapter, NebulaClient, SessionStore};
use nebula_chat_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,nebula_chat_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("🚀 Starting Nebula chat server...");

    // No API key, no server
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("✅ Configuration loaded");

    let max_history = settings.conversation.max_history_messages;

    let nebula_client = NebulaClient::new(settings.nebula.clone())?;
    let nebula = Arc::new(NebulaAdapter::new(
        Box::new(nebula_client),
        SessionStore::new(max_history),
    ));

    let agent = if settings.agent.enabled {
        let agent = AgentService::new(
            settings.agent.clone(),
            nebula.clone(),
            SessionStore::new(max_history),
        )?;
        info!("✅ Agent mode enabled");
        Some(Arc::new(agent))
    } else {
        info!("Agent mode disabled");
        None
    };

    let app = build_router(AppState { nebula, agent });

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}
