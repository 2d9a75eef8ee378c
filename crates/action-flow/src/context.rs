//! Per-run execution context handed to every step executor.

use std::sync::Arc;
use std::time::Duration;

use action_locator::Locator;
use action_primitives::{ActionPrimitives, DefaultActionPrimitives, TypingOptions, WaitProfile};
use extensions_bridge::RemoteFileRelay;
use formflow_core_types::{FormProfile, Step};
use formflow_page_port::PagePort;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::operator::{LoggingOperator, Operator};

/// Engine pacing. All values in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTimings {
    /// Pause between steps so the hosted page's own updates settle.
    pub step_pause_ms: u64,
    /// Per-character delay when a step simulates typing.
    pub typing_delay_ms: u64,
    /// Best-effort wait for a gated step's label to become visible.
    pub conditional_wait_ms: u64,
    /// Pause after a click before state is re-read.
    pub settle_ms: u64,
    /// Budget for a searchable dropdown to render its options.
    pub option_wait_ms: u64,
    /// Budget for a dependent dropdown to populate.
    pub dependent_wait_ms: u64,
    /// Budget for a new record section to appear after an add click.
    pub section_wait_ms: u64,
    /// Budget for a human upload to complete.
    pub upload_wait_ms: u64,
    pub upload_poll_ms: u64,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            step_pause_ms: 500,
            typing_delay_ms: 50,
            conditional_wait_ms: 3_000,
            settle_ms: 300,
            option_wait_ms: 3_000,
            dependent_wait_ms: WaitProfile::DROPDOWN_POPULATE.timeout.as_millis() as u64,
            section_wait_ms: 5_000,
            upload_wait_ms: WaitProfile::UPLOAD_COMPLETION.timeout.as_millis() as u64,
            upload_poll_ms: WaitProfile::UPLOAD_COMPLETION.interval.as_millis() as u64,
        }
    }
}

impl EngineTimings {
    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    pub fn conditional_wait(&self) -> WaitProfile {
        WaitProfile::TEXT_APPEAR.with_timeout(Duration::from_millis(self.conditional_wait_ms))
    }

    pub fn option_wait(&self, step: &Step) -> WaitProfile {
        let timeout = step.options.dropdown_wait_ms.unwrap_or(self.option_wait_ms);
        WaitProfile::SELECTOR_APPEAR.with_timeout(Duration::from_millis(timeout))
    }

    pub fn dependent_wait(&self) -> WaitProfile {
        WaitProfile::DROPDOWN_POPULATE.with_timeout(Duration::from_millis(self.dependent_wait_ms))
    }

    pub fn section_wait(&self) -> WaitProfile {
        WaitProfile::SELECTOR_APPEAR.with_timeout(Duration::from_millis(self.section_wait_ms))
    }

    pub fn upload_wait(&self) -> WaitProfile {
        WaitProfile::from_millis(self.upload_wait_ms, self.upload_poll_ms)
    }
}

/// Everything a step executor may touch.
#[derive(Clone)]
pub struct ExecCtx {
    pub page: Arc<dyn PagePort>,
    pub primitives: Arc<dyn ActionPrimitives>,
    pub locator: Arc<Locator>,
    /// Absent when no privileged host is connected; attachments are skipped.
    pub relay: Option<RemoteFileRelay>,
    pub operator: Arc<dyn Operator>,
    pub profile: Arc<FormProfile>,
    pub timings: EngineTimings,
}

impl ExecCtx {
    /// Context with default primitives, no relay and a logging operator.
    pub fn new(page: Arc<dyn PagePort>, profile: Arc<FormProfile>) -> Self {
        Self {
            primitives: Arc::new(DefaultActionPrimitives::new(page.clone())),
            locator: Arc::new(Locator::new(page.clone(), profile.clone())),
            page,
            relay: None,
            operator: Arc::new(LoggingOperator::new()),
            profile,
            timings: EngineTimings::default(),
        }
    }

    pub fn with_relay(mut self, relay: RemoteFileRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_timings(mut self, timings: EngineTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Let the hosted page react to the last interaction.
    pub async fn settle(&self) {
        if self.timings.settle_ms > 0 {
            sleep(Duration::from_millis(self.timings.settle_ms)).await;
        }
    }

    pub fn typing(&self, step: &Step) -> TypingOptions {
        TypingOptions::with_delay_ms(step.options.typing_delay_ms.unwrap_or(self.timings.typing_delay_ms))
    }
}
