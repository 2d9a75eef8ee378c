//! Privileged host side: performs cross-origin fetches and case API calls.

use async_trait::async_trait;
use formflow_core_types::file::guess_mime_type;
use serde_json::Value;
use tracing::{info, warn};

use crate::messages::{FileResponse, RelayRequest, RelayResponse, SubmissionResponse, WireFile};
use crate::BridgeError;

#[async_trait]
pub trait RelayHost: Send + Sync {
    async fn fetch_file(&self, url: &str, filename: &str) -> Result<WireFile, BridgeError>;

    async fn save_submission(&self, data: &Value) -> Result<SubmissionResponse, BridgeError>;

    /// Turn a request into its wire reply; errors become `{success: false, error}`.
    async fn handle(&self, request: &RelayRequest) -> RelayResponse {
        match request {
            RelayRequest::FetchFile { url, filename } => {
                RelayResponse::File(match self.fetch_file(url, filename).await {
                    Ok(file) => FileResponse {
                        success: true,
                        file: Some(file),
                        error: None,
                    },
                    Err(err) => FileResponse {
                        success: false,
                        file: None,
                        error: Some(err.to_string()),
                    },
                })
            }
            RelayRequest::SaveSubmission { data } => {
                RelayResponse::Submission(match self.save_submission(data).await {
                    Ok(response) => response,
                    Err(err) => SubmissionResponse::failed(err.to_string()),
                })
            }
        }
    }
}

/// Host backed by an HTTP client.
pub struct HttpRelayHost {
    client: reqwest::Client,
    api_base_url: Option<String>,
}

impl HttpRelayHost {
    pub fn new(api_base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.map(|base| base.trim_end_matches('/').to_string()),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl RelayHost for HttpRelayHost {
    async fn fetch_file(&self, url: &str, filename: &str) -> Result<WireFile, BridgeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Remote(format!("GET {} returned {}", url, status)));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty() && value != "application/octet-stream")
            .unwrap_or_else(|| guess_mime_type(filename).to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;

        info!(filename, bytes = bytes.len(), mime_type = %mime_type, "Fetched remote file");
        Ok(WireFile::from_bytes(filename, mime_type, bytes.to_vec()))
    }

    async fn save_submission(&self, data: &Value) -> Result<SubmissionResponse, BridgeError> {
        let Some(base) = &self.api_base_url else {
            warn!("No case API configured; submission must be recorded manually");
            return Ok(SubmissionResponse {
                success: false,
                requires_manual: Some(true),
                error: Some("case API not configured".to_string()),
            });
        };

        let response = self
            .client
            .post(format!("{}/submissions", base))
            .json(data)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Remote(format!("case API returned {}", status)));
        }

        // An empty or non-JSON body still means the API accepted the record.
        let body = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str::<SubmissionResponse>(&body).unwrap_or_else(|_| SubmissionResponse::saved()))
    }
}
