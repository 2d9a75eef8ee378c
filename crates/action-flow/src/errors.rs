//! Flow execution error types

use action_primitives::ActionError;
use formflow_core_types::FlowDefinitionError;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// No bundled or loaded flow has this id
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    /// Flow definition failed to load or validate
    #[error(transparent)]
    Definition(#[from] FlowDefinitionError),

    /// The page could not be opened or went away
    #[error("Page unavailable: {0}")]
    PageUnavailable(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Action primitive error that escaped a step
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Whether the run itself is over (as opposed to one step failing).
    pub fn is_fatal(&self) -> bool {
        match self {
            FlowError::Action(err) => err.is_fatal(),
            FlowError::PageUnavailable(_) => true,
            _ => false,
        }
    }
}
