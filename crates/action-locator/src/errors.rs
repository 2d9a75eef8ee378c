//! Error types for locator system

use formflow_page_port::PageError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Locator spec carries neither a selector nor a label
    #[error("Invalid locator: {0}")]
    InvalidSpec(String),

    /// The page failed while resolving
    #[error("Page error: {0}")]
    Page(#[from] PageError),
}

impl LocatorError {
    /// Whether the run cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, LocatorError::Page(err) if err.is_fatal())
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::Page(err) if err.is_fatal() => 3,
            LocatorError::Page(_) => 2,
            LocatorError::InvalidSpec(_) => 1,
        }
    }
}
