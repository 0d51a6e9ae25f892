//! Initialize the configuration directory: create ~/.line-relay, a default config, and INSTRUCTIONS.md.
//!
//! Existing files are never overwritten.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;
use crate::instructions::{DEFAULT_INSTRUCTIONS, INSTRUCTIONS_FILE};

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Seeds `INSTRUCTIONS.md` from the bundled default if missing.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let instructions = config_dir.join(INSTRUCTIONS_FILE);
    if !instructions.exists() {
        std::fs::write(&instructions, DEFAULT_INSTRUCTIONS)
            .with_context(|| format!("writing default instructions to {}", instructions.display()))?;
        log::info!("wrote default instructions to {}", instructions.display());
    } else {
        log::debug!("instructions already exist at {}, skipping", instructions.display());
    }

    Ok(config_dir.to_path_buf())
}
