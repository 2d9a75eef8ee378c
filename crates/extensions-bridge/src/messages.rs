//! Wire shapes of the privileged relay.

use formflow_core_types::RemoteFile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::BridgeError;

/// Typed request carried to the privileged host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayRequest {
    #[serde(rename = "fetchFile")]
    FetchFile { url: String, filename: String },
    #[serde(rename = "SAVE_SUBMISSION")]
    SaveSubmission { data: Value },
}

impl RelayRequest {
    pub fn op(&self) -> &'static str {
        match self {
            RelayRequest::FetchFile { .. } => "fetchFile",
            RelayRequest::SaveSubmission { .. } => "SAVE_SUBMISSION",
        }
    }
}

/// Request envelope sent to the host.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub req_id: Uuid,
    pub deadline_ms: u64,
    #[serde(flatten)]
    pub message: RelayRequest,
}

impl BridgeRequest {
    pub fn new(message: RelayRequest, deadline_ms: u64) -> Self {
        Self {
            req_id: Uuid::new_v4(),
            deadline_ms,
            message,
        }
    }
}

/// File as serialized across the boundary; `data` is a plain number array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: usize,
    pub data: Vec<u8>,
}

impl WireFile {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len(),
            data,
        }
    }

    /// Rebuild the in-page file; a size that disagrees with the bytes means
    /// the serialization was truncated.
    pub fn into_remote_file(self) -> Result<RemoteFile, BridgeError> {
        if self.size != self.data.len() {
            return Err(BridgeError::Malformed(format!(
                "file '{}' declares {} bytes but carries {}",
                self.name,
                self.size,
                self.data.len()
            )));
        }
        Ok(RemoteFile::new(self.name, self.mime_type, self.data))
    }
}

/// `fetchFile` reply: `{success, file}` or `{success: false, error}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<WireFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `SAVE_SUBMISSION` reply: `{success, requiresManual?}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_manual: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResponse {
    pub fn saved() -> Self {
        Self {
            success: true,
            requires_manual: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            requires_manual: None,
            error: Some(error.into()),
        }
    }

    pub fn requires_manual(&self) -> bool {
        self.requires_manual.unwrap_or(false)
    }
}

/// Reply matching the request kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayResponse {
    File(FileResponse),
    Submission(SubmissionResponse),
}

/// Response envelope from the host.
#[derive(Clone, Debug, Serialize)]
pub struct BridgeResponse {
    pub req_id: Uuid,
    #[serde(flatten)]
    pub message: RelayResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_use_the_host_message_names() {
        let request = BridgeRequest::new(
            RelayRequest::FetchFile {
                url: "https://files.example/a.pdf".into(),
                filename: "a.pdf".into(),
            },
            5_000,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "fetchFile");
        assert_eq!(value["filename"], "a.pdf");
        assert_eq!(value["deadline_ms"], 5_000);

        let save: RelayRequest =
            serde_json::from_value(json!({"type": "SAVE_SUBMISSION", "data": {"n": 1}})).unwrap();
        assert_eq!(save.op(), "SAVE_SUBMISSION");
    }

    #[test]
    fn file_data_is_a_number_array() {
        let response = FileResponse {
            success: true,
            file: Some(WireFile::from_bytes("s.png", "image/png", vec![137, 80])),
            error: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "file": {"name": "s.png", "type": "image/png", "size": 2, "data": [137, 80]}})
        );
    }

    #[test]
    fn truncated_files_are_malformed() {
        let mut wire = WireFile::from_bytes("s.png", "image/png", vec![1, 2, 3]);
        wire.size = 10;
        assert!(matches!(
            wire.into_remote_file(),
            Err(BridgeError::Malformed(_))
        ));
    }
}
