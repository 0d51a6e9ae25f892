//! POST /callback: LINE webhook handling.
//!
//! Received -> signature checked -> rejected (400, nothing else happens) or accepted.
//! Accepted deliveries fire a loading indicator per event with a user, then answer each
//! text message in order. Every per-event failure is resolved inside that event.
//! Processing outlives the HTTP request: a client that hangs up still gets its replies.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::agent;
use crate::channels::{
    dispatch_reply, parse_webhook_events, spawn_loading, verify_signature, InboundEvent,
    SIGNATURE_HEADER,
};
use crate::gateway::server::GatewayState;
use crate::routing;

/// Webhook entry point. The body is taken as raw bytes: the signature covers exactly what was sent.
pub async fn line_callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(&state.channel_secret, &body, signature) {
        log::warn!("webhook: rejected delivery with missing or invalid signature");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "invalid signature" })),
        );
    }

    let events = match parse_webhook_events(&body) {
        Ok(events) => events,
        Err(e) => {
            log::warn!("webhook: signed body is not a webhook payload: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "invalid payload" })),
            );
        }
    };

    // Processing runs on its own task so a dropped connection cannot cancel replies.
    // Loading tasks are detached; the response does not wait for them.
    let delivery = tokio::spawn(async move {
        let _loading = process_delivery(&state, events).await;
    });
    if let Err(e) = delivery.await {
        log::error!("webhook: delivery task failed: {}", e);
    }
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// Process one accepted delivery. Loading indicators go out first for every event with a
/// user so they show while earlier events are still being answered. Returns the loading
/// task handles.
pub async fn process_delivery(
    state: &GatewayState,
    events: Vec<InboundEvent>,
) -> Vec<JoinHandle<()>> {
    let loading: Vec<JoinHandle<()>> = events
        .iter()
        .filter_map(|e| e.user_id.clone())
        .map(|user_id| spawn_loading(state.channel.clone(), user_id))
        .collect();

    for event in &events {
        handle_event(state, event).await;
    }
    loading
}

async fn handle_event(state: &GatewayState, event: &InboundEvent) {
    let Some(text) = event.text() else {
        log::debug!("webhook: ignoring {:?}", event.kind);
        return;
    };
    let Some(reply_token) = event.reply_token.as_deref() else {
        log::warn!("webhook: text message without reply token, cannot answer");
        return;
    };

    let key = routing::conversation_key(state.scope, event);
    let result = agent::generate_reply(
        state.backend.as_ref(),
        &state.conversations,
        &state.assistant.assistant_id,
        &key,
        text,
        &state.poll,
    )
    .await;
    dispatch_reply(state.channel.as_ref(), reply_token, &result).await;
}
