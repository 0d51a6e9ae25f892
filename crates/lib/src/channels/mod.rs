//! Messaging channel (LINE).
//!
//! Webhook payload decoding, signature verification, the channel trait the gateway
//! replies through, and the loading/reply dispatchers that never let a platform failure
//! escape into the pipeline.

mod dispatch;
mod handle;
mod inbound;
mod line;
mod signature;

pub use dispatch::{dispatch_reply, spawn_loading};
pub use handle::{ChannelError, ChannelHandle};
pub use inbound::{EventKind, InboundEvent};
pub use line::{parse_webhook_events, truncate_reply, LineChannel, LINE_TEXT_LIMIT};
pub use signature::{sign_body, verify_signature, SIGNATURE_HEADER};
