//! Core data types for action primitives

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use formflow_page_port::PagePort;
use serde::{Deserialize, Serialize};

use crate::errors::ActionError;

/// How a click was finally delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMethod {
    /// Synthetic pointer/mouse sequence
    Dispatched,
    /// Programmatic `element.click()` after the sequence failed
    Native,
}

/// Text entry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingOptions {
    /// Pause after each character; zero types as fast as events dispatch
    pub per_char_delay: Duration,
}

impl TypingOptions {
    pub fn with_delay_ms(ms: u64) -> Self {
        Self {
            per_char_delay: Duration::from_millis(ms),
        }
    }
}

/// Cheap summary of the page used to tell whether an action changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFingerprint {
    pub url: String,
    text_hash: u64,
    text_len: usize,
}

impl PageFingerprint {
    pub async fn capture(page: &dyn PagePort) -> Result<Self, ActionError> {
        let url = page.current_url().await?;
        let text = page.body_text().await?;
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Ok(Self {
            url,
            text_hash: hasher.finish(),
            text_len: text.len(),
        })
    }

    /// Whether `later` differs from this fingerprint.
    pub fn changed(&self, later: &PageFingerprint) -> bool {
        self != later
    }
}
