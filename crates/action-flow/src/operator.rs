//! Blocking prompts to the human supervising a run.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// The human at the keyboard. Upload confirmation, manual confirmation
/// numbers and manual checks all go through here.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show a message and block until it is acknowledged.
    async fn alert(&self, message: &str);

    /// Ask a yes/no question.
    async fn confirm(&self, message: &str) -> bool;

    /// Ask for a line of text; `None` when the human declines.
    async fn prompt(&self, message: &str) -> Option<String>;
}

/// Unattended operator: logs every message and answers from presets.
#[derive(Debug, Default)]
pub struct LoggingOperator {
    messages: Mutex<Vec<String>>,
    decline: bool,
    answer: Option<String>,
}

impl LoggingOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every `confirm` with "no".
    pub fn declining() -> Self {
        Self {
            decline: true,
            ..Self::default()
        }
    }

    /// Answer every `prompt` with `answer`.
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    fn record(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[async_trait]
impl Operator for LoggingOperator {
    async fn alert(&self, message: &str) {
        info!(message, "Operator alert");
        self.record(message);
    }

    async fn confirm(&self, message: &str) -> bool {
        info!(message, answer = !self.decline, "Operator confirm");
        self.record(message);
        !self.decline
    }

    async fn prompt(&self, message: &str) -> Option<String> {
        info!(message, "Operator prompt");
        self.record(message);
        self.answer.clone()
    }
}
