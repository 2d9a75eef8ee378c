//! Privileged relay bridge.
//!
//! The in-page engine cannot fetch cross-origin bytes or call the case API
//! itself. It sends typed requests to a privileged host over a
//! request/response channel and gets typed replies back:
//! - `fetchFile{url, filename}` -> `{success, file:{name, type, size, data}}`
//! - `SAVE_SUBMISSION{data}` -> `{success, requiresManual?}`

mod channel;
pub mod config;
mod host;
pub mod messages;
mod relay;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use channel::{event_bus, serve, Bridge, Envelope, RelayBridge};
pub use config::BridgeConfig;
pub use host::{HttpRelayHost, RelayHost};
pub use messages::*;
pub use relay::{RemoteFileRelay, SaveOutcome, SubmissionPersister};

/// Errors surfaced by the bridge.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("timeout")]
    Timeout,
    #[error("channel closed")]
    ChannelClosed,
    /// Host reported a failure
    #[error("remote error: {0}")]
    Remote(String),
    /// Network failure on the host side
    #[error("transport error: {0}")]
    Transport(String),
    /// Reply did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BridgeError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout | BridgeError::Transport(_) | BridgeError::Remote(_)
        )
    }
}

/// Channel event bus.
pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

/// Events emitted by the bridge to observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BridgeEvent {
    InvokeOk { op: String },
    InvokeFail { op: String, error: String },
}
