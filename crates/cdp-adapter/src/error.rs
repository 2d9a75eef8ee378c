use std::fmt;

use formflow_page_port::PageError;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    LaunchFailed,
    /// The websocket or the transport loop is gone.
    #[error("cdp io")]
    CdpIo,
    /// Chrome answered the command with an error object.
    #[error("cdp protocol error")]
    Protocol,
    #[error("timed out")]
    Timeout,
    #[error("navigation failed")]
    Navigation,
    #[error("internal")]
    Internal,
}

#[derive(Clone, Debug)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<Value>,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether the tab or its session no longer exists.
    pub fn is_target_gone(&self) -> bool {
        match self.kind {
            AdapterErrorKind::CdpIo => true,
            AdapterErrorKind::Protocol => self
                .hint
                .as_deref()
                .map(|hint| {
                    let hint = hint.to_ascii_lowercase();
                    hint.contains("target closed")
                        || (hint.contains("session") && hint.contains("not found"))
                })
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {}", self.kind, hint),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<AdapterError> for PageError {
    fn from(err: AdapterError) -> Self {
        if err.is_target_gone() {
            PageError::Closed(err.to_string())
        } else {
            PageError::Script(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_sessions_are_fatal_for_the_page() {
        let gone = AdapterError::new(AdapterErrorKind::Protocol)
            .with_hint("cdp error -32001: Session with given id not found.");
        assert!(PageError::from(gone).is_fatal());

        let io = AdapterError::new(AdapterErrorKind::CdpIo).with_hint("cdp connection closed");
        assert!(PageError::from(io).is_fatal());
    }

    #[test]
    fn other_failures_stay_recoverable() {
        let protocol = AdapterError::new(AdapterErrorKind::Protocol)
            .with_hint("cdp error -32000: Cannot find context with specified id");
        assert!(matches!(PageError::from(protocol), PageError::Script(_)));

        let timeout = AdapterError::new(AdapterErrorKind::Timeout).with_hint("command timed out");
        assert!(!PageError::from(timeout).is_fatal());
    }
}
