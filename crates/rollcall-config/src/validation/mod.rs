//! Full configuration validation.
//!
//! Each section has its own validator; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod presence;
mod transport;

#[cfg(test)]
mod tests;

use crate::schema::RollcallConfig;
use rollcall_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RollcallConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    presence::validate_presence(&mut errors, config);
    transport::validate_realtime(&mut errors, config);
    transport::validate_reachability(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
