use action_primitives::ActionError;
use async_trait::async_trait;
use formflow_core_types::{InputKind, Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use tracing::debug;

use super::{missing_value, section_scope, step_value, TEXT_CONTROL_SELECTOR};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

/// Free text, number, date and textarea fields.
pub struct TextInputExecutor;

/// How the value ended up in the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryMethod {
    Typed,
    ClickThenTyped,
    Assigned,
}

impl EntryMethod {
    fn as_str(self) -> &'static str {
        match self {
            EntryMethod::Typed => "typed",
            EntryMethod::ClickThenTyped => "click_then_typed",
            EntryMethod::Assigned => "assigned",
        }
    }
}

impl TextInputExecutor {
    /// Selector from the step, then the profile's per-key map, then the label.
    async fn input(&self, step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
        let scope = section_scope(ctx, step).await?;
        let mapped = step
            .data_key
            .as_deref()
            .and_then(|key| ctx.profile.input_selectors.get(key));
        for selector in step.locator.selector.iter().chain(mapped) {
            if let Some(node) = ctx.locator.find_by_selector(scope, selector).await? {
                return Ok(Some(node));
            }
        }
        let Some(label) = step.locator.label.as_deref() else {
            return Ok(None);
        };
        match ctx.locator.find_by_text(scope, label).await? {
            Some(found) => Ok(ctx
                .locator
                .control_for_label(found, TEXT_CONTROL_SELECTOR)
                .await?),
            None => Ok(None),
        }
    }

    async fn enter(
        &self,
        step: &Step,
        ctx: &ExecCtx,
        input: NodeId,
        value: &str,
    ) -> Result<EntryMethod, ActionError> {
        match step.options.input_kind {
            InputKind::Date => {
                // Date widgets ignore keystrokes until they have been activated.
                ctx.primitives.click(input).await?;
                ctx.settle().await;
                ctx.primitives.type_into(input, value, ctx.typing(step)).await?;
                Ok(EntryMethod::ClickThenTyped)
            }
            _ if step.options.simulate_typing => {
                ctx.primitives.type_into(input, value, ctx.typing(step)).await?;
                Ok(EntryMethod::Typed)
            }
            _ => {
                ctx.primitives.set_value_framework_safe(input, value).await?;
                Ok(EntryMethod::Assigned)
            }
        }
    }
}

#[async_trait]
impl StepExecutor for TextInputExecutor {
    fn kind(&self) -> StepKind {
        StepKind::TextInput
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
        let Some(input) = self.input(step, ctx).await? else {
            let label_missing = match (&step.locator.selector, &step.locator.label) {
                (None, Some(label)) => ctx.locator.find_by_text(None, label).await?.is_none(),
                _ => false,
            };
            let reason = if label_missing {
                ReasonCode::LabelNotFound
            } else {
                ReasonCode::InputNotFound
            };
            return Ok(StepResult::failed(&step.id, reason));
        };

        let mut method = self.enter(step, ctx, input, &value).await?;
        let mut current = ctx.page.value(input).await?;
        if current != value && method == EntryMethod::Assigned {
            debug!(step_id = %step.id, "Assigned value did not stick, typing instead");
            ctx.primitives.type_into(input, &value, ctx.typing(step)).await?;
            method = EntryMethod::Typed;
            current = ctx.page.value(input).await?;
        }

        // Date widgets may reformat what was typed; any value counts there.
        let accepted = current == value
            || (step.options.input_kind == InputKind::Date && !current.trim().is_empty());
        let result = if accepted {
            StepResult::ok(&step.id).with_value(value)
        } else {
            StepResult::failed(&step.id, ReasonCode::NoMatchingValue)
                .with_value(value)
                .with_diagnostic("actual", current)
        };
        Ok(result.with_diagnostic("method", method.as_str()))
    }
}
