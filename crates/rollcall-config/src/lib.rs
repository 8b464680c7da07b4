//! Rollcall configuration system.
//!
//! TOML-based configuration for the presence core and its transports.
//! Every section uses serde defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rollcall_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("heartbeat every {}s", config.presence.heartbeat_interval_secs);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    LogLevel, LoggingConfig, PresenceConfig, ReachabilityConfig, RealtimeConfig, RollcallConfig,
    CONFIG_SCHEMA_VERSION,
};

use rollcall_common::ConfigError;

/// Load config from the platform default path, creating it if missing.
pub fn load_config() -> Result<RollcallConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &RollcallConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
