//! AI backend abstraction and the OpenAI Assistants client.
//!
//! The backend owns assistants, threads, runs, and thread messages; the relay only
//! holds ids. `AssistantBackend` is the seam the orchestrator and tests work against.

mod backend;
mod openai;

pub use backend::{
    AssistantBackend, Assistant, AssistantSpec, AssistantsError, MessageContent, Run, RunError,
    RunStatus, TextAnnotation, TextContent, ThreadMessage,
};
pub use openai::OpenAiAssistantsClient;
