use action_primitives::ActionError;
use async_trait::async_trait;
use formflow_core_types::{Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use tracing::{debug, info};

use super::{
    choice_text, click_until_checked, label_of, match_choice, missing_value, section_scope,
    step_value, RADIO_SELECTOR,
};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

/// Radio group. The question's container (optionally inside a named
/// section) holds the options.
pub struct RadioExecutor;

impl RadioExecutor {
    async fn group(&self, step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
        let scope = section_scope(ctx, step).await?;
        if let Some(selector) = step.locator.selector.as_deref() {
            if let Some(node) = ctx.locator.find_by_selector(scope, selector).await? {
                // A selector may point at the group itself or at one radio in it.
                if ctx.page.matches(node, RADIO_SELECTOR).await? {
                    return Ok(ctx.locator.container_of(node).await?);
                }
                return Ok(Some(node));
            }
        }
        match step.locator.label.as_deref() {
            Some(label) => Ok(ctx.locator.container_from_label(scope, label).await?),
            None => Ok(scope),
        }
    }

    /// Disable and hide options outside the allow-list. Nothing is removed.
    async fn restrict(
        &self,
        ctx: &ExecCtx,
        radios: &[NodeId],
        allowed: &[String],
    ) -> Result<usize, ActionError> {
        let mut restricted = 0;
        for radio in radios {
            let value = ctx.page.attribute(*radio, "value").await?.unwrap_or_default();
            let text = choice_text(ctx, *radio).await?;
            let permitted = allowed
                .iter()
                .any(|a| *a == value || action_locator::texts_match(&text, a));
            if permitted {
                continue;
            }
            ctx.page.set_attribute(*radio, "disabled", "").await?;
            let hide = label_of(ctx, *radio).await?.unwrap_or(*radio);
            ctx.page.set_attribute(hide, "style", "display: none").await?;
            ctx.page.set_attribute(*radio, "data-formflow-restricted", "").await?;
            restricted += 1;
        }
        Ok(restricted)
    }
}

#[async_trait]
impl StepExecutor for RadioExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Radio
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let Some(value) = step_value(step, payload) else {
            return Ok(missing_value(step));
        };
        if let Some(allowed) = &step.options.allowed_values {
            if !allowed.iter().any(|a| *a == value) {
                info!(step_id = %step.id, value = %value, "Value outside the allowed set");
                return Ok(StepResult::failed(&step.id, ReasonCode::ValueNotAllowed)
                    .with_value(value));
            }
        }

        let Some(group) = self.group(step, ctx).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::ContainerNotFound));
        };
        let radios = ctx.page.query_selector_all(Some(group), RADIO_SELECTOR).await?;
        if radios.is_empty() {
            return Ok(StepResult::failed(&step.id, ReasonCode::RadioNotFound));
        }

        let Some(input) = match_choice(ctx, &radios, &value).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::NoMatchingValue).with_value(value));
        };

        let mut result = StepResult::ok(&step.id).with_value(value.clone());
        if let Some(allowed) = &step.options.allowed_values {
            let restricted = self.restrict(ctx, &radios, allowed).await?;
            result = result.with_diagnostic("restricted", restricted);
        }

        if ctx.page.is_checked(input).await? {
            debug!(step_id = %step.id, "Radio already selected");
            return Ok(result.with_diagnostic("already", true));
        }

        let mut attempts = Vec::new();
        if let Some(label) = label_of(ctx, input).await? {
            attempts.push(("label", label));
            if let Some(parent) = ctx.page.parent(label).await? {
                attempts.push(("label_parent", parent));
            }
        }
        attempts.push(("input", input));

        if let Some(method) = click_until_checked(ctx, input, true, &attempts).await? {
            return Ok(result.with_diagnostic("method", method));
        }

        // Last resort: assign the state and notify listeners.
        ctx.primitives.assign_checked(input, true).await?;
        if ctx.page.is_checked(input).await? {
            return Ok(result.with_diagnostic("method", "assign"));
        }
        Ok(StepResult::failed(&step.id, ReasonCode::NoMethodSucceeded).with_value(value))
    }
}
