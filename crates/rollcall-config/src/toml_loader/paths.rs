//! Where rollcall keeps its config file.
//!
//! `ROLLCALL_CONFIG` names a file directly; otherwise the file lives at
//! `<config_dir>/rollcall/config.toml`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use rollcall_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ROLLCALL_CONFIG";

const APP_DIR: &str = "rollcall";
const FILE_NAME: &str = "config.toml";

/// Resolve the config file rollcall reads when no path is given.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    resolve_config_path(std::env::var_os(CONFIG_PATH_ENV), dirs::config_dir())
}

/// An explicit, non-empty override wins over the platform directory.
pub(crate) fn resolve_config_path(
    explicit: Option<OsString>,
    platform_dir: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit.filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    platform_dir
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| {
            ConfigError::ParseError(format!(
                "no platform config directory; set {CONFIG_PATH_ENV} to choose a file"
            ))
        })
}

/// Write the commented default presence config to `path`, creating parent
/// directories as needed.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    let io_error = |what: &str, target: &Path, e: std::io::Error| {
        ConfigError::ParseError(format!("cannot {what} {}: {e}", target.display()))
    };

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_error("create rollcall config dir", dir, e))?;
    }
    std::fs::write(path, default_config_toml())
        .map_err(|e| io_error("write default rollcall config to", path, e))?;

    info!(path = %path.display(), "wrote default rollcall config");
    Ok(())
}
