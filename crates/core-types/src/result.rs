//! Step and run results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reason::ReasonCode;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    /// Echo of the value the step applied, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub diagnostics: Map<String, Value>,
}

impl StepResult {
    pub fn ok(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            reason: None,
            value: None,
            skipped: false,
            diagnostics: Map::new(),
        }
    }

    pub fn failed(step_id: impl Into<String>, reason: ReasonCode) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            ..Self::ok(step_id)
        }
    }

    /// Gated-out steps count as successful so that later conditionals that
    /// depend on them are not blocked by an unrelated skip.
    pub fn skipped(step_id: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::ok(step_id)
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_reason(mut self, reason: ReasonCode) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_diagnostic(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.diagnostics.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

/// Outcome of a whole flow run. The step list is append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub flow_id: String,
    steps: Vec<StepResult>,
    pub status: RunStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            steps: Vec::new(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn push(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Latest result recorded for a step id.
    pub fn result_for(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().rev().find(|r| r.step_id == step_id)
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Error;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    /// Milliseconds between start and finish; `None` while running.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|r| !r.success)
    }
}
