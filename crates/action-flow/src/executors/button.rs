use std::time::Duration;

use action_primitives::{ActionError, PageFingerprint};
use async_trait::async_trait;
use formflow_core_types::{Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use tokio::time::sleep;
use tracing::{debug, info};

use super::section_scope;
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

const BUTTON_LIKE: &str =
    "button, a, [role=\"button\"], input[type=\"submit\"], input[type=\"button\"]";

/// Buttons and links, optionally retried until the page reacts.
pub struct ButtonExecutor;

impl ButtonExecutor {
    async fn button(&self, step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
        let scope = section_scope(ctx, step).await?;
        if let Some(selector) = step.locator.selector.as_deref() {
            if let Some(node) = ctx.locator.find_by_selector(scope, selector).await? {
                return Ok(Some(node));
            }
        }
        let Some(label) = step.locator.label.as_deref() else {
            return Ok(None);
        };
        if let Some(node) = ctx.locator.find_by_text_among(scope, label, BUTTON_LIKE).await? {
            return Ok(Some(node));
        }
        match ctx.locator.find_by_text(scope, label).await? {
            Some(text) => Ok(ctx.locator.actionable_ancestor(text).await?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StepExecutor for ButtonExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Button
    }

    async fn execute(
        &self,
        step: &Step,
        _payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let retry = step.options.retry;
        let max_attempts = retry.map(|r| r.max_attempts.max(1)).unwrap_or(1);
        let interval = Duration::from_millis(retry.map(|r| r.interval_ms).unwrap_or(0));
        let mut seen = false;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                sleep(interval).await;
            }
            // Re-locate each time; the page may have re-rendered the control.
            let Some(button) = self.button(step, ctx).await? else {
                if retry.is_none() {
                    return Ok(StepResult::failed(&step.id, ReasonCode::ButtonNotFound));
                }
                debug!(step_id = %step.id, attempt, "Button not rendered yet");
                continue;
            };
            seen = true;
            if ctx.page.is_disabled(button).await? {
                debug!(step_id = %step.id, attempt, "Button disabled, waiting for validation");
                continue;
            }

            let before = PageFingerprint::capture(ctx.page.as_ref()).await?;
            match ctx.primitives.click(button).await {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!(step_id = %step.id, attempt, error = %err, "Button click failed");
                    continue;
                }
            }
            ctx.settle().await;

            if retry.is_none() {
                return Ok(StepResult::ok(&step.id).with_diagnostic("attempts", attempt));
            }
            let after = PageFingerprint::capture(ctx.page.as_ref()).await?;
            if before.changed(&after) {
                info!(step_id = %step.id, attempt, "Button advanced the page");
                return Ok(StepResult::ok(&step.id)
                    .with_diagnostic("attempts", attempt)
                    .with_diagnostic("page_changed", true));
            }
            debug!(step_id = %step.id, attempt, "Page unchanged after click");
        }

        let reason = if !seen {
            ReasonCode::ButtonNotFound
        } else {
            ReasonCode::ButtonClickFailed
        };
        Ok(StepResult::failed(&step.id, reason).with_diagnostic("attempts", max_attempts))
    }
}
