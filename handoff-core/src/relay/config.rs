//! Configuration for relay delivery

use serde::{Deserialize, Serialize};

/// Where notifications are delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Write notifications to the log only
    #[default]
    Log,
    /// POST notifications as JSON to `webhook_url`
    Webhook,
}

/// Configuration for the relay forwarder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub sink: SinkKind,

    /// Target for the webhook sink
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Events waiting for delivery before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery attempts per notification, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Failed notifications kept for inspection
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_dead_letter_capacity() -> usize {
    100
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            webhook_url: None,
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}
