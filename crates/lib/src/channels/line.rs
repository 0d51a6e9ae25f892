//! LINE channel: webhook payload decoding, loading indicator, and reply via the Messaging API.

use async_trait::async_trait;
use serde::Deserialize;
use std::borrow::Cow;
use std::time::Duration;

use crate::channels::handle::{ChannelError, ChannelHandle};
use crate::channels::inbound::{EventKind, InboundEvent};

const LINE_API_BASE: &str = "https://api.line.me";

/// Maximum characters in one LINE text message.
pub const LINE_TEXT_LIMIT: usize = 5000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    events: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineEvent {
    #[serde(rename = "type", default)]
    event_type: Option<String>,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<LineSource>,
    #[serde(default)]
    message: Option<LineMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineSource {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl LineEvent {
    /// Reduce to an inbound event. None when a message event lacks the fields its type requires.
    /// An event without `type` counts as a message event when it carries a message.
    fn into_inbound(self) -> Option<InboundEvent> {
        let is_message = match self.event_type.as_deref() {
            Some(t) => t == "message",
            None => self.message.is_some(),
        };
        let kind = if is_message {
            let message = self.message?;
            if message.message_type == "text" {
                EventKind::TextMessage {
                    text: message.text?,
                }
            } else {
                EventKind::OtherMessage {
                    message_type: message.message_type,
                }
            }
        } else {
            EventKind::Other {
                event_type: self.event_type.unwrap_or_default(),
            }
        };
        let (user_id, conversation_id) = match self.source {
            Some(s) => {
                let user_id = non_empty(s.user_id);
                let conversation_id = non_empty(s.group_id)
                    .or(non_empty(s.room_id))
                    .or_else(|| user_id.clone());
                (user_id, conversation_id)
            }
            None => (None, None),
        };
        Some(InboundEvent {
            kind,
            user_id,
            conversation_id,
            reply_token: non_empty(self.reply_token),
        })
    }
}

/// Decode a webhook body. Fails only when the body itself is not a JSON object;
/// individual events that cannot be decoded are logged and skipped.
pub fn parse_webhook_events(body: &[u8]) -> Result<Vec<InboundEvent>, serde_json::Error> {
    let payload: WebhookBody = serde_json::from_slice(body)?;
    log::debug!(
        "line webhook: {} event(s) for destination {:?}",
        payload.events.len(),
        payload.destination
    );
    let mut events = Vec::with_capacity(payload.events.len());
    for (i, raw) in payload.events.into_iter().enumerate() {
        match serde_json::from_value::<LineEvent>(raw) {
            Ok(e) => match e.into_inbound() {
                Some(inbound) => events.push(inbound),
                None => log::warn!("line webhook: event {} is missing message fields, skipping", i),
            },
            Err(e) => log::warn!("line webhook: event {} could not be decoded, skipping: {}", i, e),
        }
    }
    Ok(events)
}

/// Shorten text to LINE's per-message limit, ending with an ellipsis when cut.
pub fn truncate_reply(text: &str) -> Cow<'_, str> {
    if text.chars().count() <= LINE_TEXT_LIMIT {
        return Cow::Borrowed(text);
    }
    let mut out: String = text.chars().take(LINE_TEXT_LIMIT - 1).collect();
    out.push('…');
    Cow::Owned(out)
}

/// LINE Messaging API connector.
pub struct LineChannel {
    id: String,
    access_token: String,
    api_base: String,
    loading_seconds: Option<u32>,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(
        access_token: impl Into<String>,
        api_base: Option<String>,
        loading_seconds: Option<u32>,
    ) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        let loading_seconds = loading_seconds.filter(|s| {
            let ok = (5..=60).contains(s) && s % 5 == 0;
            if !ok {
                log::warn!(
                    "line: loadingSeconds {} is not a multiple of 5 between 5 and 60, using platform default",
                    s
                );
            }
            ok
        });
        Self {
            id: "line".to_string(),
            access_token: access_token.into(),
            api_base,
            loading_seconds,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ChannelError> {
        let url = format!("{}{}", self.api_base, path);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("{} {} {}", path, status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelHandle for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    /// POST /v2/bot/chat/loading/start
    async fn start_loading(&self, chat_id: &str) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "chatId": chat_id });
        if let Some(s) = self.loading_seconds {
            body["loadingSeconds"] = serde_json::Value::from(s);
        }
        self.post("/v2/bot/chat/loading/start", &body).await
    }

    /// POST /v2/bot/message/reply
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": truncate_reply(text) }],
        });
        self.post("/v2/bot/message/reply", &body).await
    }
}
