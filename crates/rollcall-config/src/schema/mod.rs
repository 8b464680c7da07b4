//! Configuration schema types for Rollcall.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod logging;
mod presence;
mod reachability;
mod realtime;

pub use logging::*;
pub use presence::*;
pub use reachability::*;
pub use realtime::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Rollcall.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    pub presence: PresenceConfig,
    pub realtime: RealtimeConfig,
    pub reachability: ReachabilityConfig,
    pub logging: LoggingConfig,
}
