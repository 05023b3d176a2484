//! Configuration schema types for Warden.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod backend;
mod output;
mod rate_limit;
mod resolver;
mod session;
mod system;

pub use backend::*;
pub use output::*;
pub use rate_limit::*;
pub use resolver::*;
pub use session::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Warden.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    pub rate_limit: RateLimitConfig,
    pub sessions: SessionsConfig,
    pub resolver: ResolverConfig,
    pub bootstrap: BootstrapConfig,
    pub output: OutputConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
