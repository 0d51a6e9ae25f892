//! Gateway HTTP server (single port).

use anyhow::{Context, Result};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::channels::{ChannelHandle, LineChannel};
use crate::config::{self, Config, ConversationScope, PollPolicy};
use crate::gateway::webhook::line_callback;
use crate::instructions;
use crate::llm::{AssistantBackend, AssistantSpec, OpenAiAssistantsClient};
use crate::provision::{provision_assistant, AssistantContext};
use crate::session::ConversationStore;

/// Shared state for the gateway: channel, backend, the provisioned assistant, and conversations.
#[derive(Clone)]
pub struct GatewayState {
    pub port: u16,
    /// LINE channel secret for X-Line-Signature verification.
    pub channel_secret: Arc<str>,
    pub channel: Arc<dyn ChannelHandle>,
    pub backend: Arc<dyn AssistantBackend>,
    pub assistant: Arc<AssistantContext>,
    pub conversations: Arc<ConversationStore>,
    pub scope: ConversationScope,
    pub poll: PollPolicy,
}

/// Routes served by the gateway.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(line_callback))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Provisions the assistant before binding, so a misconfigured backend fails startup
/// instead of failing every message. Blocks until shutdown (e.g. Ctrl+C).
/// `config_path` locates INSTRUCTIONS.md.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let creds = config::resolve_credentials(&config)?;
    let instructions =
        instructions::resolve_instructions(&config, config::config_dir(&config_path));

    let backend: Arc<dyn AssistantBackend> = Arc::new(OpenAiAssistantsClient::new(
        creds.openai_api_key.clone(),
        config.openai.base_url.clone(),
    ));
    let spec = AssistantSpec {
        name: config.assistant.name.clone(),
        model: config.assistant.model.clone(),
        instructions,
        vector_store_id: creds.vector_store_id.clone(),
    };
    let pinned_id = config::resolve_assistant_id(&config);
    let assistant = provision_assistant(backend.as_ref(), pinned_id.as_deref(), spec)
        .await
        .context("provisioning assistant")?;

    let channel: Arc<dyn ChannelHandle> = Arc::new(LineChannel::new(
        creds.channel_access_token.clone(),
        config.line.api_base.clone(),
        config.line.loading_seconds,
    ));

    let scope = config.conversations.scope;
    if scope == ConversationScope::Shared {
        log::warn!("conversations.scope is \"shared\": every chat writes to one thread");
    }

    let state = GatewayState {
        port: config.gateway.port,
        channel_secret: Arc::from(creds.channel_secret.as_str()),
        channel,
        backend,
        assistant: Arc::new(assistant),
        conversations: Arc::new(ConversationStore::new()),
        scope,
        poll: PollPolicy::from(&config.run),
    };

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {} (webhook path /callback)", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// In-flight webhook requests are allowed to finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
        "assistantId": state.assistant.assistant_id,
        "conversations": state.conversations.len().await,
    }))
}
