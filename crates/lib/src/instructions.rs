//! Assistant instructions loader: INSTRUCTIONS.md next to the config file, then config, then the bundled default.

use std::fs;
use std::path::Path;

use crate::config::Config;

/// Instructions shipped with the binary; also seeded by `init`.
pub const DEFAULT_INSTRUCTIONS: &str = include_str!("../config/INSTRUCTIONS.md");

pub const INSTRUCTIONS_FILE: &str = "INSTRUCTIONS.md";

/// Load INSTRUCTIONS.md from the config directory. Returns None when missing or blank.
pub fn load_instructions_file(config_dir: &Path) -> Option<String> {
    let path = config_dir.join(INSTRUCTIONS_FILE);
    match fs::read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Resolve the instructions sent to the assistant.
pub fn resolve_instructions(config: &Config, config_dir: &Path) -> String {
    if let Some(s) = load_instructions_file(config_dir) {
        log::debug!("using assistant instructions from {}", config_dir.join(INSTRUCTIONS_FILE).display());
        return s;
    }
    config
        .assistant
        .instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.trim())
        .to_string()
}
