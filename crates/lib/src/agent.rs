//! Agent turn: append the user's message to the conversation thread, run the assistant,
//! wait for the run to finish (bounded), and read back the reply.
//!
//! Failures never escape: `generate_reply` turns every error into an `Error: ...` reply so
//! the user always gets an answer.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::PollPolicy;
use crate::llm::{AssistantBackend, AssistantsError, MessageContent, Run, RunStatus, ThreadMessage};
use crate::session::{Conversation, ConversationStore};

/// What gets sent back to the chat for one text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyResult {
    Text(String),
    /// Full user-visible error text, already prefixed with "Error: ".
    Error(String),
}

impl ReplyResult {
    pub fn error(details: impl fmt::Display) -> Self {
        ReplyResult::Error(format!("Error: {}", details))
    }

    /// Text to put in the chat message.
    pub fn as_text(&self) -> &str {
        match self {
            ReplyResult::Text(s) | ReplyResult::Error(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReplyResult::Text(_) => "text",
            ReplyResult::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReplyResult::Error(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] AssistantsError),
    #[error("run {run_id} ended with status {status}{detail}")]
    RunFailed {
        run_id: String,
        status: &'static str,
        detail: String,
    },
    #[error("run {run_id} timed out after {timeout:?} (last status {status})")]
    Timeout {
        run_id: String,
        timeout: Duration,
        status: &'static str,
    },
    #[error("assistant returned no text for run {0}")]
    EmptyResponse(String),
    #[error("turn timed out after {0:?} waiting on the assistants api")]
    Stalled(Duration),
}

/// Run one turn and convert any failure into an error reply.
pub async fn generate_reply(
    backend: &dyn AssistantBackend,
    store: &ConversationStore,
    assistant_id: &str,
    conversation_key: &str,
    text: &str,
    policy: &PollPolicy,
) -> ReplyResult {
    match run_turn(backend, store, assistant_id, conversation_key, text, policy).await {
        Ok(reply) => ReplyResult::Text(reply),
        Err(e) => {
            log::warn!("agent: turn for {} failed: {}", conversation_key, e);
            ReplyResult::error(e)
        }
    }
}

/// One turn on the conversation's thread. The turn lock is held from append to read so
/// concurrent deliveries for the same conversation cannot interleave runs.
///
/// The whole turn is bounded by `policy.turn_limit()`, so a call that never answers still
/// ends in an error. A run left active by any failure is cancelled (best effort).
pub async fn run_turn(
    backend: &dyn AssistantBackend,
    store: &ConversationStore,
    assistant_id: &str,
    conversation_key: &str,
    text: &str,
    policy: &PollPolicy,
) -> Result<String, TurnError> {
    let conversation = store.get_or_create(conversation_key).await;
    let _turn = conversation.lock_turn().await;

    let limit = policy.turn_limit();
    let mut started = None;
    let outcome = tokio::time::timeout(
        limit,
        turn_steps(backend, &conversation, assistant_id, text, policy, &mut started),
    )
    .await;
    match outcome {
        Ok(result) => result,
        Err(_) => {
            if let (Some(thread_id), Some(run_id)) = (conversation.thread_id(), started.as_deref())
            {
                cancel_quietly(backend, thread_id, run_id, policy.slack()).await;
            }
            Err(TurnError::Stalled(limit))
        }
    }
}

/// Append, run, wait, read. `started` is set as soon as the run exists.
async fn turn_steps(
    backend: &dyn AssistantBackend,
    conversation: &Conversation,
    assistant_id: &str,
    text: &str,
    policy: &PollPolicy,
    started: &mut Option<String>,
) -> Result<String, TurnError> {
    let thread_id = conversation.thread(backend).await?;

    backend.add_user_message(thread_id, text).await?;
    let run = backend.create_run(thread_id, assistant_id).await?;
    *started = Some(run.id.clone());
    log::debug!("agent: started run {} on thread {}", run.id, thread_id);

    let run_id = run.id.clone();
    let run = match wait_for_run(backend, thread_id, run, policy).await {
        Ok(run) => run,
        Err(e) => {
            cancel_quietly(backend, thread_id, &run_id, policy.slack()).await;
            return Err(e);
        }
    };

    if run.status != RunStatus::Completed {
        // requires_action keeps the thread locked until the run is cancelled
        if run.status == RunStatus::RequiresAction {
            cancel_quietly(backend, thread_id, &run.id, policy.slack()).await;
        }
        let detail = run
            .last_error
            .as_ref()
            .map(|e| format!(": {} {}", e.code, e.message).trim_end().to_string())
            .unwrap_or_default();
        return Err(TurnError::RunFailed {
            run_id: run.id,
            status: run.status.as_str(),
            detail,
        });
    }

    let messages = backend.list_run_messages(thread_id, &run.id).await?;
    let reply = extract_reply(&messages).ok_or_else(|| TurnError::EmptyResponse(run.id.clone()))?;
    log::info!(
        "agent: run {} on thread {} produced {} chars",
        run.id,
        thread_id,
        reply.chars().count()
    );
    Ok(reply)
}

/// Poll until the run is terminal, doubling the wait each round up to the cap.
/// Poll errors are retried until the deadline.
async fn wait_for_run(
    backend: &dyn AssistantBackend,
    thread_id: &str,
    mut run: Run,
    policy: &PollPolicy,
) -> Result<Run, TurnError> {
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.initial_interval;
    while !run.status.is_terminal() {
        let now = Instant::now();
        if now >= deadline {
            return Err(TurnError::Timeout {
                run_id: run.id,
                timeout: policy.timeout,
                status: run.status.as_str(),
            });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
        match backend.get_run(thread_id, &run.id).await {
            Ok(next) => run = next,
            Err(e) => log::warn!("agent: polling run {} failed, retrying: {}", run.id, e),
        }
        interval = (interval * 2).min(policy.max_interval);
    }
    Ok(run)
}

/// Cancel so the thread accepts new messages. Failures are only logged.
async fn cancel_quietly(
    backend: &dyn AssistantBackend,
    thread_id: &str,
    run_id: &str,
    limit: Duration,
) {
    match tokio::time::timeout(limit, backend.cancel_run(thread_id, run_id)).await {
        Ok(Ok(_)) => log::info!("agent: cancelled run {} on thread {}", run_id, thread_id),
        Ok(Err(e)) => log::warn!("agent: cancelling run {} failed: {}", run_id, e),
        Err(_) => log::warn!(
            "agent: cancelling run {} did not answer within {:?}",
            run_id,
            limit
        ),
    }
}

/// First text segment of the newest assistant message, with citation markers removed.
/// None when there is no assistant message or the text is blank.
pub fn extract_reply(messages: &[ThreadMessage]) -> Option<String> {
    let message = messages.iter().find(|m| m.role == "assistant")?;
    let text = message.content.iter().find_map(|c| match c {
        MessageContent::Text { text } => Some(text),
        MessageContent::Other => None,
    })?;
    let mut value = text.value.clone();
    for annotation in &text.annotations {
        if !annotation.text.is_empty() {
            value = value.replace(&annotation.text, "");
        }
    }
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
