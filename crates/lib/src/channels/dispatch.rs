//! Loading and reply dispatch. Both resolve their own failures: log and drop.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::agent::ReplyResult;
use crate::channels::handle::ChannelHandle;

/// Fire the loading indicator for a chat on a detached task.
/// The handle is returned for callers that want to observe completion; dropping it detaches.
pub fn spawn_loading(channel: Arc<dyn ChannelHandle>, chat_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match channel.start_loading(&chat_id).await {
            Ok(()) => log::debug!("{}: loading indicator started", channel.id()),
            Err(e) => log::warn!("{}: loading indicator failed: {}", channel.id(), e),
        }
    })
}

/// Send a reply result to the event's reply token. Returns whether the platform accepted it.
pub async fn dispatch_reply(
    channel: &dyn ChannelHandle,
    reply_token: &str,
    result: &ReplyResult,
) -> bool {
    match channel.reply(reply_token, result.as_text()).await {
        Ok(()) => {
            log::debug!("{}: reply sent ({})", channel.id(), result.kind());
            true
        }
        Err(e) => {
            log::warn!("{}: reply failed: {}", channel.id(), e);
            false
        }
    }
}
