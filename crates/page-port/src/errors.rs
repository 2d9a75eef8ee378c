//! Error types for page access

use thiserror::Error;

use crate::port::NodeId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The handle refers to an element that left the tree
    #[error("Element {0} is detached from the page")]
    Detached(NodeId),

    /// Selector could not be parsed by the page
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// A page-side script threw or returned an unexpected shape
    #[error("Script error: {0}")]
    Script(String),

    /// The page or its transport is gone; nothing further can succeed
    #[error("Page closed: {0}")]
    Closed(String),

    /// The operation does not apply to this element
    #[error("Unsupported on element: {0}")]
    Unsupported(String),
}

impl PageError {
    /// Whether the whole run should stop rather than just the current step.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PageError::Closed(_))
    }
}
