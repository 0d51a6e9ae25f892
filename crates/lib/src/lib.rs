//! LINE relay core library: webhook verification, conversation threads on the OpenAI
//! Assistants API, and reply dispatch. Used by the `line-relay` binary.

pub mod agent;
pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod instructions;
pub mod llm;
pub mod provision;
pub mod routing;
pub mod session;

#[cfg(test)]
mod testing;
