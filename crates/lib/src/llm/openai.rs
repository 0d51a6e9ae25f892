//! OpenAI Assistants API (v2) client.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::backend::{
    Assistant, AssistantBackend, AssistantSpec, AssistantsError, Run, ThreadMessage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA: &str = "assistants=v2";
const LIST_ASSISTANTS_LIMIT: &str = "100";
const LIST_MESSAGES_LIMIT: &str = "20";
/// Per-request bound; a stalled call surfaces as a request error instead of hanging.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Assistants endpoints.
#[derive(Clone)]
pub struct OpenAiAssistantsClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl OpenAiAssistantsClient {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key: api_key.into(),
            client: http_client(REQUEST_TIMEOUT),
        }
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    /// Send, map non-2xx to `Api` (preferring the API's own error message), decode the body.
    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AssistantsError> {
        let res = req.send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AssistantsError::Api(format!("{} {}", status, detail)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistantsClient {
    /// GET /assistants — first page only, newest first.
    async fn find_assistant_by_name(&self, name: &str) -> Result<Option<Assistant>, AssistantsError> {
        let req = self
            .request(Method::GET, "/assistants")
            .query(&[("limit", LIST_ASSISTANTS_LIMIT), ("order", "desc")]);
        let list: ListResponse<Assistant> = self.send(req).await?;
        Ok(list
            .data
            .into_iter()
            .find(|a| a.name.as_deref() == Some(name)))
    }

    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<Assistant, AssistantsError> {
        let req = self
            .request(Method::POST, "/assistants")
            .json(&spec.to_request_body());
        self.send(req).await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        spec: &AssistantSpec,
    ) -> Result<Assistant, AssistantsError> {
        let req = self
            .request(Method::POST, &format!("/assistants/{}", assistant_id))
            .json(&spec.to_request_body());
        self.send(req).await
    }

    async fn create_thread(&self) -> Result<String, AssistantsError> {
        let req = self
            .request(Method::POST, "/threads")
            .json(&serde_json::json!({}));
        let thread: ThreadObject = self.send(req).await?;
        Ok(thread.id)
    }

    async fn add_user_message(&self, thread_id: &str, text: &str) -> Result<(), AssistantsError> {
        let req = self
            .request(Method::POST, &format!("/threads/{}/messages", thread_id))
            .json(&serde_json::json!({ "role": "user", "content": text }));
        let _: ThreadMessage = self.send(req).await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, AssistantsError> {
        let req = self
            .request(Method::POST, &format!("/threads/{}/runs", thread_id))
            .json(&serde_json::json!({ "assistant_id": assistant_id }));
        self.send(req).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantsError> {
        let req = self.request(
            Method::GET,
            &format!("/threads/{}/runs/{}", thread_id, run_id),
        );
        self.send(req).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantsError> {
        let req = self.request(
            Method::POST,
            &format!("/threads/{}/runs/{}/cancel", thread_id, run_id),
        );
        self.send(req).await
    }

    async fn list_run_messages(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<Vec<ThreadMessage>, AssistantsError> {
        let req = self
            .request(Method::GET, &format!("/threads/{}/messages", thread_id))
            .query(&[
                ("run_id", run_id),
                ("order", "desc"),
                ("limit", LIST_MESSAGES_LIMIT),
            ]);
        let list: ListResponse<ThreadMessage> = self.send(req).await?;
        Ok(list.data)
    }
}
