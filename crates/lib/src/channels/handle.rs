//! Channel trait: the calls the pipeline makes back to the messaging platform.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
}

/// Handle to a messaging channel.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;

    /// Show the "preparing a reply" indicator in a chat.
    async fn start_loading(&self, chat_id: &str) -> Result<(), ChannelError>;

    /// Answer an event with text. Reply tokens are single-use: a second call for the
    /// same token is rejected by the platform.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError>;
}
