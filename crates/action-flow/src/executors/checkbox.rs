use action_primitives::ActionError;
use async_trait::async_trait;
use formflow_core_types::{Payload, ReasonCode, Step, StepKind, StepResult};
use tracing::debug;

use super::{click_until_checked, label_of, CHECKBOX_SELECTOR};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

/// Single checkbox. Checks it unless the payload value is falsy.
pub struct CheckboxExecutor;

#[async_trait]
impl StepExecutor for CheckboxExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Checkbox
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let want = step
            .data_key
            .as_deref()
            .map(|key| payload.is_truthy(key))
            .unwrap_or(true);

        let Some(found) = ctx.locator.locate(&step.locator).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::LabelNotFound));
        };
        let input = if ctx.page.matches(found, CHECKBOX_SELECTOR).await? {
            found
        } else {
            match ctx.locator.control_for_label(found, CHECKBOX_SELECTOR).await? {
                Some(input) => input,
                None => return Ok(StepResult::failed(&step.id, ReasonCode::CheckboxNotFound)),
            }
        };

        if ctx.page.is_checked(input).await? == want {
            debug!(step_id = %step.id, checked = want, "Checkbox already in the wanted state");
            return Ok(StepResult::ok(&step.id)
                .with_value(want)
                .with_diagnostic("already", true));
        }

        let label = match label_of(ctx, input).await? {
            Some(label) => Some(label),
            None if found != input => Some(found),
            None => None,
        };
        let wrapper = ctx
            .page
            .closest(input, &ctx.profile.checkbox_wrapper_selector)
            .await?
            .or(ctx.page.parent(input).await?);

        let mut attempts = Vec::new();
        if let Some(label) = label {
            attempts.push(("label", label));
        }
        attempts.push(("input", input));
        if let Some(wrapper) = wrapper {
            attempts.push(("wrapper", wrapper));
        }

        match click_until_checked(ctx, input, want, &attempts).await? {
            Some(method) => Ok(StepResult::ok(&step.id)
                .with_value(want)
                .with_diagnostic("method", method)),
            None => Ok(StepResult::failed(&step.id, ReasonCode::ClickFailed)),
        }
    }
}
