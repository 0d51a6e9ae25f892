//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.line-relay/config.json`) and environment.
//! Credentials are usually supplied through the environment; the file carries tunables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// LINE Messaging API settings.
    #[serde(default)]
    pub line: LineConfig,

    /// OpenAI API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Assistant provisioned at startup.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// How inbound messages map onto conversation threads.
    #[serde(default)]
    pub conversations: ConversationsConfig,

    /// Run polling bounds.
    #[serde(default)]
    pub run: RunConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook listener (default 5000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; LINE must be able to reach the callback).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// LINE channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used to verify X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Long-lived channel access token. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// API base URL (default https://api.line.me). Useful for tests and proxies.
    pub api_base: Option<String>,
    /// Loading animation duration in seconds (5-60, multiple of 5). LINE's default when unset.
    pub loading_seconds: Option<u32>,
}

/// OpenAI API config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiConfig {
    /// API key. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    /// API base URL (default https://api.openai.com/v1).
    pub base_url: Option<String>,
    /// Pre-indexed vector store the assistant searches. Overridden by VECTOR_STORE_ID env.
    pub vector_store_id: Option<String>,
}

/// Assistant identity and behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Existing assistant to reuse. Overridden by OPENAI_ASSISTANT_ID env. When unset the assistant is looked up by name.
    pub id: Option<String>,
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_assistant_model")]
    pub model: String,
    /// Inline instructions; INSTRUCTIONS.md next to the config file takes precedence.
    pub instructions: Option<String>,
}

fn default_assistant_name() -> String {
    "Rules Explainer".to_string()
}

fn default_assistant_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: default_assistant_name(),
            model: default_assistant_model(),
            instructions: None,
        }
    }
}

/// Which conversations share a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConversationScope {
    /// One thread per LINE chat (group, room, or one-to-one user).
    #[default]
    PerChat,
    /// One thread for every message the process receives.
    Shared,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsConfig {
    #[serde(default)]
    pub scope: ConversationScope,
}

/// Run polling: first wait, backoff cap, and overall deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_interval_ms")]
    pub max_poll_interval_ms: u64,
    #[serde(default = "default_run_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_interval_ms() -> u64 {
    4000
}

fn default_run_timeout_secs() -> u64 {
    120
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_ms: default_max_poll_interval_ms(),
            timeout_secs: default_run_timeout_secs(),
        }
    }
}

/// Bounds applied while waiting for a run to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
}

impl From<&RunConfig> for PollPolicy {
    fn from(run: &RunConfig) -> Self {
        let initial = run.poll_interval_ms.max(1);
        Self {
            initial_interval: Duration::from_millis(initial),
            max_interval: Duration::from_millis(run.max_poll_interval_ms.max(initial)),
            timeout: Duration::from_secs(run.timeout_secs),
        }
    }
}

/// Floor for the time a turn may run past the poll deadline (final poll, cancel).
const TURN_SLACK_MIN: Duration = Duration::from_secs(1);

impl PollPolicy {
    /// Extra time a turn gets beyond `timeout` to finish its last call or cancel.
    pub fn slack(&self) -> Duration {
        self.max_interval.max(TURN_SLACK_MIN)
    }

    /// Hard bound on one whole turn, including calls that never answer.
    pub fn turn_limit(&self) -> Duration {
        self.timeout + self.slack()
    }
}

/// Secrets and identifiers the gateway cannot start without.
#[derive(Clone)]
pub struct Credentials {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub openai_api_key: String,
    pub vector_store_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("channel_secret", &"<redacted>")
            .field("channel_access_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("vector_store_id", &self.vector_store_id)
            .finish()
    }
}

/// Non-empty trimmed env var.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env var when set, otherwise the trimmed config value.
fn env_or(name: &str, configured: Option<&String>) -> Option<String> {
    env_value(name).or_else(|| {
        configured
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the channel secret: env LINE_CHANNEL_SECRET overrides config.
pub fn resolve_channel_secret(config: &Config) -> Option<String> {
    env_or("LINE_CHANNEL_SECRET", config.line.channel_secret.as_ref())
}

/// Resolve the channel access token: env LINE_CHANNEL_ACCESS_TOKEN overrides config.
pub fn resolve_channel_access_token(config: &Config) -> Option<String> {
    env_or(
        "LINE_CHANNEL_ACCESS_TOKEN",
        config.line.channel_access_token.as_ref(),
    )
}

/// Resolve the OpenAI API key: env OPENAI_API_KEY overrides config.
pub fn resolve_openai_api_key(config: &Config) -> Option<String> {
    env_or("OPENAI_API_KEY", config.openai.api_key.as_ref())
}

/// Resolve the vector store id: env VECTOR_STORE_ID overrides config.
pub fn resolve_vector_store_id(config: &Config) -> Option<String> {
    env_or("VECTOR_STORE_ID", config.openai.vector_store_id.as_ref())
}

/// Resolve a pinned assistant id: env OPENAI_ASSISTANT_ID overrides config.
pub fn resolve_assistant_id(config: &Config) -> Option<String> {
    env_or("OPENAI_ASSISTANT_ID", config.assistant.id.as_ref())
}

/// Resolve the listen port: env PORT overrides config. An unparsable PORT is ignored with a warning.
pub fn resolve_port(config: &Config) -> u16 {
    match env_value("PORT") {
        Some(p) => match p.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                log::warn!("ignoring invalid PORT value {:?}", p);
                config.gateway.port
            }
        },
        None => config.gateway.port,
    }
}

/// Collect all required credentials, failing on the first one missing.
pub fn resolve_credentials(config: &Config) -> Result<Credentials> {
    let channel_secret = resolve_channel_secret(config)
        .context("missing LINE channel secret (set LINE_CHANNEL_SECRET or line.channelSecret)")?;
    let channel_access_token = resolve_channel_access_token(config).context(
        "missing LINE channel access token (set LINE_CHANNEL_ACCESS_TOKEN or line.channelAccessToken)",
    )?;
    let openai_api_key = resolve_openai_api_key(config)
        .context("missing OpenAI API key (set OPENAI_API_KEY or openai.apiKey)")?;
    let vector_store_id = resolve_vector_store_id(config)
        .context("missing vector store id (set VECTOR_STORE_ID or openai.vectorStoreId)")?;
    Ok(Credentials {
        channel_secret,
        channel_access_token,
        openai_api_key,
        vector_store_id,
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".line-relay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Directory holding the config file (and INSTRUCTIONS.md).
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 5000);
        assert_eq!(g.bind, "0.0.0.0");
    }

    #[test]
    fn empty_object_parses_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.assistant.name, "Rules Explainer");
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(config.conversations.scope, ConversationScope::PerChat);
        assert_eq!(config.run.timeout_secs, 120);
    }

    #[test]
    fn camel_case_fields_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "line": { "channelSecret": "s", "loadingSeconds": 30 },
                "openai": { "vectorStoreId": "vs_1", "baseUrl": "http://localhost:9" },
                "conversations": { "scope": "shared" },
                "run": { "pollIntervalMs": 100 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.line.channel_secret.as_deref(), Some("s"));
        assert_eq!(config.line.loading_seconds, Some(30));
        assert_eq!(config.openai.vector_store_id.as_deref(), Some("vs_1"));
        assert_eq!(config.conversations.scope, ConversationScope::Shared);
        assert_eq!(config.run.poll_interval_ms, 100);
        assert_eq!(config.run.max_poll_interval_ms, 4000);
    }

    #[test]
    fn poll_policy_clamps_max_below_initial() {
        let run = RunConfig {
            poll_interval_ms: 800,
            max_poll_interval_ms: 200,
            timeout_secs: 5,
        };
        let policy = PollPolicy::from(&run);
        assert_eq!(policy.initial_interval, Duration::from_millis(800));
        assert_eq!(policy.max_interval, Duration::from_millis(800));
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.turn_limit(), Duration::from_millis(6000));
    }

    #[test]
    fn turn_limit_adds_max_interval_when_larger() {
        let policy = PollPolicy::from(&RunConfig::default());
        assert_eq!(policy.slack(), Duration::from_millis(4000));
        assert_eq!(policy.turn_limit(), Duration::from_secs(124));
    }

    #[test]
    fn config_dir_of_bare_file_is_current_dir() {
        assert_eq!(config_dir(Path::new("config.json")), Path::new("."));
        assert_eq!(
            config_dir(Path::new("/etc/relay/config.json")),
            Path::new("/etc/relay")
        );
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = Credentials {
            channel_secret: "topsecret".to_string(),
            channel_access_token: "token".to_string(),
            openai_api_key: "sk-abc".to_string(),
            vector_store_id: "vs_1".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("topsecret"));
        assert!(!shown.contains("sk-abc"));
        assert!(shown.contains("vs_1"));
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("line-relay-does-not-exist/config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 5000);
    }
}
