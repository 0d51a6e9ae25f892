//! Conversation routing: which thread an inbound event belongs to.
//!
//! Per-chat scope keys by the LINE chat (group, room, or user); shared scope puts every
//! event on one key. Events without any chat id fall back to the shared key.

use crate::channels::InboundEvent;
use crate::config::ConversationScope;

/// Key used when the scope is shared or the event names no chat.
pub const SHARED_CONVERSATION_KEY: &str = "shared";

/// Resolve the conversation key for an inbound event.
pub fn conversation_key(scope: ConversationScope, event: &InboundEvent) -> String {
    match (scope, event.conversation_id.as_deref()) {
        (ConversationScope::PerChat, Some(id)) if !id.is_empty() => format!("chat:{}", id),
        _ => SHARED_CONVERSATION_KEY.to_string(),
    }
}
