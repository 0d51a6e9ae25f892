//! Backend trait and the wire types shared by every implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AssistantsError {
    #[error("openai request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("openai api error: {0}")]
    Api(String),
    #[error("openai response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Assistant as returned by the backend (only the fields the relay reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: String,
}

/// Desired assistant configuration: applied on create and on every startup update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSpec {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub vector_store_id: String,
}

impl AssistantSpec {
    /// Request body for create/update: file_search tool bound to the vector store.
    pub fn to_request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "model": self.model,
            "instructions": self.instructions,
            "tools": [{ "type": "file_search" }],
            "tool_resources": {
                "file_search": { "vector_store_ids": [self.vector_store_id] }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// True once the run will not change status on its own.
    /// `requires_action` counts: no function tools are registered, so nothing would resume it.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
            RunStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// One run of an assistant on a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAnnotation {
    /// Marker inside the text value (e.g. a file_search citation).
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<TextAnnotation>,
}

/// One content segment of a thread message. Non-text segments (images, refusals) are kept opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Operations the relay needs from the AI backend.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// First assistant whose name matches exactly, if any.
    async fn find_assistant_by_name(&self, name: &str) -> Result<Option<Assistant>, AssistantsError>;

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantsError>;

    async fn update_assistant(
        &self,
        assistant_id: &str,
        spec: &AssistantSpec,
    ) -> Result<Assistant, AssistantsError>;

    /// Create an empty thread; returns its id.
    async fn create_thread(&self) -> Result<String, AssistantsError>;

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), AssistantsError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AssistantsError>;

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantsError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantsError>;

    /// Messages produced by a run, newest first.
    async fn list_run_messages(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<ThreadMessage>, AssistantsError>;
}
