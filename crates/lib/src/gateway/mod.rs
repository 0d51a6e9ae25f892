//! Gateway: HTTP server receiving LINE webhooks.
//!
//! `POST /callback` verifies the signature, fans out loading indicators, and answers each
//! text message through the assistant. `GET /` is a health probe.

mod server;
mod webhook;

pub use server::{router, run_gateway, GatewayState};
pub use webhook::{line_callback, process_delivery};
