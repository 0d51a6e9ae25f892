//! Inbound events from a channel, reduced to what the pipeline acts on.

/// What happened. Only `TextMessage` is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TextMessage { text: String },
    /// A message that is not text (image, sticker, location, ...).
    OtherMessage { message_type: String },
    /// A non-message event (follow, join, postback, ...).
    Other { event_type: String },
}

/// One event from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    /// Sender; drives the loading indicator.
    pub user_id: Option<String>,
    /// Chat the event happened in (group, room, or the user for one-to-one chats).
    pub conversation_id: Option<String>,
    /// Single-use handle for answering this event.
    pub reply_token: Option<String>,
}

impl InboundEvent {
    /// Message text when this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::TextMessage { text } => Some(text),
            _ => None,
        }
    }
}
