//! Progress events pushed toward the supervising context.

use serde::{Deserialize, Serialize};

/// Message type carried by every progress event on the wire.
pub const FILLING_STATUS: &str = "FILLING_STATUS";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    FlowStarted,
    FillingField,
    FieldCompleted,
    FieldFailed,
    SuccessDetected,
    Saving,
    SubmissionComplete,
    ManualRequired,
    SubmissionFailed,
    MonitoringActive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub stage: ProgressStage,
    pub message: String,
    pub requires_manual_action: bool,
    pub is_complete: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            event_type: FILLING_STATUS.to_string(),
            stage,
            message: message.into(),
            requires_manual_action: false,
            is_complete: false,
            success: false,
            step_id: None,
        }
    }

    pub fn for_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }

    pub fn manual(mut self) -> Self {
        self.requires_manual_action = true;
        self
    }

    pub fn succeeded(mut self) -> Self {
        self.success = true;
        self
    }

    pub fn complete(mut self, success: bool) -> Self {
        self.is_complete = true;
        self.success = success;
        self
    }
}
