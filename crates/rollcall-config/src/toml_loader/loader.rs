//! Core TOML config loading: read from path or platform default.

use crate::schema::RollcallConfig;
use crate::validation;
use rollcall_common::ConfigError;
use std::path::Path;
use tracing::{info, warn};

use super::paths::{create_default_config, default_config_path};

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
/// A config that parses but fails validation is replaced by the defaults,
/// since out-of-range timings would change presence behavior silently.
pub fn load_from_path(path: &Path) -> Result<RollcallConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: RollcallConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(RollcallConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path, or from the file
/// named by `ROLLCALL_CONFIG` when set.
///
/// On macOS: `~/Library/Application Support/rollcall/config.toml`
/// On Linux: `~/.config/rollcall/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<RollcallConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(RollcallConfig::default());
    }

    load_from_path(&path)
}
