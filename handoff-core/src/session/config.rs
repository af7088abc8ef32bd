//! Configuration for session lifetime and replay handling

use serde::{Deserialize, Serialize};

use super::ReplayPolicy;

/// Session lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a session stays valid after issuance; 0 keeps sessions forever
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// How often expired sessions are swept from memory
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Whether a used session accepts another submission
    #[serde(default)]
    pub replay: ReplayPolicy,
}

fn default_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            replay: ReplayPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// TTL as a duration, or `None` when retention is unbounded
    pub fn ttl(&self) -> Option<chrono::Duration> {
        if self.ttl_secs == 0 {
            None
        } else {
            i64::try_from(self.ttl_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
        }
    }
}
