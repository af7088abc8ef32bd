use handoff_core::{ReplayPolicy, SinkKind};
use serde::Deserialize;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawHandoffConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub session: RawSessionConfig,

    #[serde(default)]
    pub capture: RawCaptureConfig,

    #[serde(default)]
    pub relay: RawRelayConfig,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub operator_token: Option<String>,
    pub bypass_localhost: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSessionConfig {
    pub ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub replay: Option<ReplayPolicy>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCaptureConfig {
    pub title: Option<String>,
    pub purpose: Option<String>,
    pub providers: Option<Vec<String>>,
    pub plans: Option<Vec<String>>,
    pub max_photo_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRelayConfig {
    pub sink: Option<SinkKind>,
    pub webhook_url: Option<String>,
    pub queue_capacity: Option<usize>,
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub dead_letter_capacity: Option<usize>,
}
