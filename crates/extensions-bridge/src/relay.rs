//! Engine-facing relay operations.

use std::sync::Arc;
use std::time::Duration;

use formflow_core_types::RemoteFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::channel::Bridge;
use crate::config::BridgeConfig;
use crate::messages::{RelayRequest, RelayResponse};
use crate::BridgeError;

/// Fetches cross-origin file bytes through the privileged host.
#[derive(Clone)]
pub struct RemoteFileRelay {
    bridge: Arc<dyn Bridge>,
}

impl RemoteFileRelay {
    pub fn new(bridge: Arc<dyn Bridge>) -> Self {
        Self { bridge }
    }

    /// Fetch and rebuild a file. Any failure is `None`; callers skip the
    /// attachment.
    pub async fn fetch_file(&self, url: &str, filename: &str) -> Option<RemoteFile> {
        match self.try_fetch_file(url, filename).await {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(url, filename, error = %err, "Remote file unavailable");
                None
            }
        }
    }

    pub async fn try_fetch_file(&self, url: &str, filename: &str) -> Result<RemoteFile, BridgeError> {
        let response = self
            .bridge
            .invoke(RelayRequest::FetchFile {
                url: url.to_string(),
                filename: filename.to_string(),
            })
            .await?;
        let RelayResponse::File(response) = response else {
            return Err(BridgeError::Malformed("expected a file reply".to_string()));
        };
        if !response.success {
            return Err(BridgeError::Remote(
                response.error.unwrap_or_else(|| "fetch failed".to_string()),
            ));
        }
        let file = response
            .file
            .ok_or_else(|| BridgeError::Malformed("reply carries no file".to_string()))?
            .into_remote_file()?;
        info!(filename = %file.name, size = file.size, "Remote file relayed");
        Ok(file)
    }
}

/// Result of handing a confirmed submission to the case API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    /// The host accepted the request but a human has to record it
    RequiresManual,
    Failed { error: String },
}

/// `SAVE_SUBMISSION` with bounded retries.
#[derive(Clone)]
pub struct SubmissionPersister {
    bridge: Arc<dyn Bridge>,
    attempts: u32,
    backoff: Duration,
}

impl SubmissionPersister {
    pub fn new(bridge: Arc<dyn Bridge>, config: &BridgeConfig) -> Self {
        Self {
            bridge,
            attempts: config.save_attempts.max(1),
            backoff: Duration::from_millis(config.save_backoff_ms),
        }
    }

    pub async fn save(&self, data: Value) -> SaveOutcome {
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=self.attempts {
            let result = self
                .bridge
                .invoke(RelayRequest::SaveSubmission { data: data.clone() })
                .await;
            match result {
                Ok(RelayResponse::Submission(response)) => {
                    if response.requires_manual() {
                        info!(attempt, "Submission needs manual recording");
                        return SaveOutcome::RequiresManual;
                    }
                    if response.success {
                        info!(attempt, "Submission saved");
                        return SaveOutcome::Saved;
                    }
                    last_error = response.error.unwrap_or_else(|| "save rejected".to_string());
                }
                Ok(RelayResponse::File(_)) => {
                    last_error = "unexpected file reply".to_string();
                }
                Err(err) => last_error = err.to_string(),
            }
            warn!(attempt, max = self.attempts, error = %last_error, "Saving submission failed");
            if attempt < self.attempts {
                sleep(self.backoff).await;
            }
        }
        SaveOutcome::Failed { error: last_error }
    }
}
