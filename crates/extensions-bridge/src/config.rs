//! Relay configuration.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Per-request deadline on the privileged channel.
    pub request_deadline_ms: u64,
    /// Requests buffered before senders wait.
    pub queue_depth: usize,
    /// Case API base address; submissions cannot be saved without it.
    pub api_base_url: Option<String>,
    /// Total SAVE_SUBMISSION attempts before giving up.
    pub save_attempts: u32,
    pub save_backoff_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_deadline_ms: 30_000,
            queue_depth: 16,
            api_base_url: None,
            save_attempts: 5,
            save_backoff_ms: 1_000,
        }
    }
}
