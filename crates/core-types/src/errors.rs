//! Error types for flow definitions and payloads

use thiserror::Error;

/// Problems found while loading or validating a flow definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowDefinitionError {
    #[error("Flow ID cannot be empty")]
    EmptyFlowId,

    #[error("Flow {0} has no steps")]
    NoSteps(String),

    #[error("Step at position {0} has an empty id")]
    EmptyStepId(usize),

    #[error("Step {step} depends on unknown step {prerequisite}")]
    UnknownPrerequisite { step: String, prerequisite: String },

    #[error("Step {step} depends on step {prerequisite}, which does not run before it")]
    ForwardPrerequisite { step: String, prerequisite: String },

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Failed to parse flow definition: {0}")]
    Parse(String),

    #[error("Payload must be a JSON object")]
    PayloadNotObject,
}

impl From<serde_yaml::Error> for FlowDefinitionError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowDefinitionError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for FlowDefinitionError {
    fn from(err: serde_json::Error) -> Self {
        FlowDefinitionError::Parse(err.to_string())
    }
}
