//! In-memory fakes for the backend and channel traits (unit tests only).

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::channels::{ChannelError, ChannelHandle};
use crate::llm::{
    Assistant, AssistantBackend, AssistantSpec, AssistantsError, MessageContent, Run, RunError,
    RunStatus, TextContent, ThreadMessage,
};

pub fn assistant_message(text: &str) -> ThreadMessage {
    ThreadMessage {
        id: "msg_reply".to_string(),
        role: "assistant".to_string(),
        content: vec![MessageContent::Text {
            text: TextContent {
                value: text.to_string(),
                annotations: Vec::new(),
            },
        }],
        run_id: None,
    }
}

struct BackendState {
    existing: Vec<Assistant>,
    name_lookups: usize,
    created: Vec<AssistantSpec>,
    updated: Vec<(String, AssistantSpec)>,
    threads_created: usize,
    fail_next_thread: bool,
    fail_add_message: Option<String>,
    user_messages: Vec<(String, String)>,
    runs: Vec<(String, String)>,
    statuses: VecDeque<RunStatus>,
    final_status: RunStatus,
    run_error: Option<RunError>,
    messages: Vec<ThreadMessage>,
    cancelled: Vec<String>,
    get_run_failures: usize,
    get_run_delay: Option<Duration>,
    stall_get_run: bool,
    calls: Vec<String>,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            existing: Vec::new(),
            name_lookups: 0,
            created: Vec::new(),
            updated: Vec::new(),
            threads_created: 0,
            fail_next_thread: false,
            fail_add_message: None,
            user_messages: Vec::new(),
            runs: Vec::new(),
            statuses: VecDeque::new(),
            final_status: RunStatus::Completed,
            run_error: None,
            messages: vec![assistant_message("generated answer")],
            cancelled: Vec::new(),
            get_run_failures: 0,
            get_run_delay: None,
            stall_get_run: false,
            calls: Vec::new(),
        }
    }
}

/// Scriptable backend: runs report `statuses` in order, then `final_status` forever.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_existing_assistant(&self, a: Assistant) {
        self.with(|s| s.existing.push(a));
    }

    pub fn fail_next_thread_creation(&self) {
        self.with(|s| s.fail_next_thread = true);
    }

    pub fn fail_add_message(&self, message: &str) {
        self.with(|s| s.fail_add_message = Some(message.to_string()));
    }

    pub fn set_run_statuses(&self, statuses: Vec<RunStatus>) {
        self.with(|s| s.statuses = statuses.into());
    }

    pub fn set_final_status(&self, status: RunStatus) {
        self.with(|s| s.final_status = status);
    }

    pub fn set_run_error(&self, e: RunError) {
        self.with(|s| s.run_error = Some(e));
    }

    pub fn set_messages(&self, messages: Vec<ThreadMessage>) {
        self.with(|s| s.messages = messages);
    }

    /// The next `times` get_run calls fail with a 503.
    pub fn fail_get_run(&self, times: usize) {
        self.with(|s| s.get_run_failures = times);
    }

    /// Every get_run call sleeps this long before answering.
    pub fn delay_get_run(&self, delay: Duration) {
        self.with(|s| s.get_run_delay = Some(delay));
    }

    /// get_run never answers.
    pub fn stall_get_run(&self) {
        self.with(|s| s.stall_get_run = true);
    }

    /// Ordered log of "add:{text}" and "list:{run id}" calls.
    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn name_lookups(&self) -> usize {
        self.with(|s| s.name_lookups)
    }

    pub fn created_assistants(&self) -> Vec<AssistantSpec> {
        self.with(|s| s.created.clone())
    }

    pub fn updated_assistants(&self) -> Vec<(String, AssistantSpec)> {
        self.with(|s| s.updated.clone())
    }

    pub fn threads_created(&self) -> usize {
        self.with(|s| s.threads_created)
    }

    /// (thread id, text) per appended user message.
    pub fn user_messages(&self) -> Vec<(String, String)> {
        self.with(|s| s.user_messages.clone())
    }

    /// (thread id, assistant id) per created run.
    pub fn runs_created(&self) -> Vec<(String, String)> {
        self.with(|s| s.runs.clone())
    }

    pub fn cancelled_runs(&self) -> Vec<String> {
        self.with(|s| s.cancelled.clone())
    }

    fn next_run(&self, run_id: &str) -> Run {
        self.with(|s| {
            let status = s.statuses.pop_front().unwrap_or(s.final_status);
            Run {
                id: run_id.to_string(),
                status,
                last_error: if status == RunStatus::Failed {
                    s.run_error.clone()
                } else {
                    None
                },
            }
        })
    }
}

#[async_trait]
impl AssistantBackend for FakeBackend {
    async fn find_assistant_by_name(&self, name: &str) -> Result<Option<Assistant>, AssistantsError> {
        Ok(self.with(|s| {
            s.name_lookups += 1;
            s.existing
                .iter()
                .find(|a| a.name.as_deref() == Some(name))
                .cloned()
        }))
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantsError> {
        Ok(self.with(|s| {
            s.created.push(spec.clone());
            Assistant {
                id: format!("asst_created_{}", s.created.len()),
                name: Some(spec.name.clone()),
                model: spec.model.clone(),
            }
        }))
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        spec: &AssistantSpec,
    ) -> Result<Assistant, AssistantsError> {
        Ok(self.with(|s| {
            s.updated.push((assistant_id.to_string(), spec.clone()));
            Assistant {
                id: assistant_id.to_string(),
                name: Some(spec.name.clone()),
                model: spec.model.clone(),
            }
        }))
    }

    async fn create_thread(&self) -> Result<String, AssistantsError> {
        self.with(|s| {
            if s.fail_next_thread {
                s.fail_next_thread = false;
                return Err(AssistantsError::Api("500 thread creation failed".to_string()));
            }
            s.threads_created += 1;
            Ok(format!("thread_{}", s.threads_created))
        })
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), AssistantsError> {
        self.with(|s| {
            if let Some(e) = &s.fail_add_message {
                return Err(AssistantsError::Api(e.clone()));
            }
            s.user_messages.push((thread_id.to_string(), text.to_string()));
            s.calls.push(format!("add:{}", text));
            Ok(())
        })
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AssistantsError> {
        let id = self.with(|s| {
            s.runs.push((thread_id.to_string(), assistant_id.to_string()));
            format!("run_{}", s.runs.len())
        });
        Ok(Run {
            id,
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn get_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AssistantsError> {
        let (stall, delay) = self.with(|s| (s.stall_get_run, s.get_run_delay));
        if stall {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self.with(|s| {
            if s.get_run_failures > 0 {
                s.get_run_failures -= 1;
                true
            } else {
                false
            }
        });
        if fail {
            return Err(AssistantsError::Api("503 upstream unavailable".to_string()));
        }
        Ok(self.next_run(run_id))
    }

    async fn cancel_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, AssistantsError> {
        self.with(|s| s.cancelled.push(run_id.to_string()));
        Ok(Run {
            id: run_id.to_string(),
            status: RunStatus::Cancelling,
            last_error: None,
        })
    }

    async fn list_run_messages(
        &self,
        _thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<ThreadMessage>, AssistantsError> {
        Ok(self.with(|s| {
            s.calls.push(format!("list:{}", run_id));
            s.messages.clone()
        }))
    }
}

#[derive(Default)]
struct ChannelState {
    loading: Vec<String>,
    replies: Vec<(String, String)>,
    fail_loading: bool,
    fail_replies: bool,
}

/// Channel that records every call.
#[derive(Default)]
pub struct FakeChannel {
    state: Mutex<ChannelState>,
}

impl FakeChannel {
    pub fn fail_loading(&self) {
        self.state.lock().unwrap().fail_loading = true;
    }

    pub fn fail_replies(&self) {
        self.state.lock().unwrap().fail_replies = true;
    }

    pub fn loading_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().loading.clone()
    }

    /// (reply token, text) per reply.
    pub fn replies(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().replies.clone()
    }
}

#[async_trait]
impl ChannelHandle for FakeChannel {
    fn id(&self) -> &str {
        "fake"
    }

    async fn start_loading(&self, chat_id: &str) -> Result<(), ChannelError> {
        let mut s = self.state.lock().unwrap();
        s.loading.push(chat_id.to_string());
        if s.fail_loading {
            return Err(ChannelError::Api("503 unavailable".to_string()));
        }
        Ok(())
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        let mut s = self.state.lock().unwrap();
        s.replies.push((reply_token.to_string(), text.to_string()));
        if s.fail_replies {
            return Err(ChannelError::Api("400 invalid reply token".to_string()));
        }
        Ok(())
    }
}
