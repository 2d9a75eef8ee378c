//! Error types for action primitives

use action_locator::LocatorError;
use formflow_page_port::PageError;
use thiserror::Error;

/// Comprehensive error types for action primitive operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// Polled condition never held before the deadline
    #[error("Timed out waiting for {what} after {attempts} attempts ({elapsed_ms}ms)")]
    WaitTimeout {
        what: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// Element did not react to any click method
    #[error("Element not clickable: {0}")]
    NotClickable(String),

    /// Element lookup failed
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Page access failed
    #[error(transparent)]
    Page(#[from] PageError),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// The page is gone; nothing further in this run can succeed
    pub fn is_fatal(&self) -> bool {
        match self {
            ActionError::Page(err) => err.is_fatal(),
            ActionError::Locator(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActionError::WaitTimeout { .. } | ActionError::NotClickable(_)
        ) || matches!(self, ActionError::Page(PageError::Detached(_)))
    }

    /// Get error severity level (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        if self.is_fatal() {
            return 3;
        }
        match self {
            ActionError::Internal(_) => 3,
            ActionError::Page(_) | ActionError::Locator(_) => 2,
            ActionError::WaitTimeout { .. } | ActionError::NotClickable(_) => 1,
            ActionError::Interrupted(_) => 0,
        }
    }

    /// Attempt count of a wait timeout
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ActionError::WaitTimeout { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
