use action_locator::{normalize_text, texts_match};
use action_primitives::{wait_for, ActionError};
use async_trait::async_trait;
use formflow_core_types::{DependentDropdown, Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use tracing::{debug, info};

use super::{missing_value, pick_searchable, section_scope, step_value, PickFallback};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

const SELECT_CONTROL: &str = "select, input";

/// Native selects and searchable dropdowns, with dependent-dropdown polling.
pub struct SelectExecutor;

pub(crate) async fn select_control(step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
    let scope = section_scope(ctx, step).await?;
    if let Some(selector) = step.locator.selector.as_deref() {
        if let Some(node) = ctx.locator.find_by_selector(scope, selector).await? {
            return Ok(Some(node));
        }
    }
    let Some(label) = step.locator.label.as_deref() else {
        return Ok(None);
    };
    match ctx.locator.find_by_text(scope, label).await? {
        Some(found) => Ok(ctx.locator.control_for_label(found, SELECT_CONTROL).await?),
        None => Ok(None),
    }
}

impl SelectExecutor {
    /// Pick an option of a native `<select>`: value, then exact text, then
    /// containment, then (if allowed) the first non-placeholder option.
    async fn pick_native(
        &self,
        step: &Step,
        ctx: &ExecCtx,
        select: NodeId,
        value: &str,
    ) -> Result<Result<String, ReasonCode>, ActionError> {
        let mut options = Vec::new();
        for option in ctx.page.query_selector_all(Some(select), "option").await? {
            let option_value = ctx.page.value(option).await?;
            let text = ctx.page.text_content(option).await?;
            options.push((option_value, text));
        }

        let wanted = normalize_text(value);
        let chosen = options
            .iter()
            .find(|(v, _)| v == value)
            .or_else(|| options.iter().find(|(_, t)| normalize_text(t) == wanted))
            .or_else(|| options.iter().find(|(_, t)| texts_match(t, value)))
            .or_else(|| {
                step.options
                    .fallback_first_option
                    .then(|| options.iter().find(|(v, _)| !v.is_empty()))
                    .flatten()
            });
        let Some((option_value, _)) = chosen else {
            return Ok(Err(ReasonCode::OptionNotFound));
        };

        ctx.primitives
            .set_value_framework_safe(select, option_value)
            .await?;
        if ctx.page.value(select).await? == *option_value {
            Ok(Ok(option_value.clone()))
        } else {
            Ok(Err(ReasonCode::NoMethodSucceeded))
        }
    }

    /// Close this dropdown and wait for the child control to report that its
    /// options have loaded.
    async fn await_dependent(
        &self,
        ctx: &ExecCtx,
        control: NodeId,
        dependent: &DependentDropdown,
    ) -> Result<bool, ActionError> {
        ctx.primitives.defocus(control).await?;
        let page = ctx.page.as_ref();
        let outcome = wait_for(
            &format!("{} dropdown", dependent.name),
            ctx.timings.dependent_wait(),
            move || async move {
                let Some(child) = page.query_selector(None, &dependent.selector).await? else {
                    return Ok(None);
                };
                let state = page.attribute(child, &dependent.state_attr).await?;
                let populated = state
                    .map(|s| {
                        let s = s.trim().to_ascii_lowercase();
                        !s.is_empty() && s != "0" && s != "false"
                    })
                    .unwrap_or(false);
                Ok::<_, ActionError>(populated.then_some(()))
            },
        )
        .await;
        match outcome {
            Ok(()) => Ok(true),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                info!(dropdown = %dependent.name, error = %err, "Dependent dropdown never populated");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl StepExecutor for SelectExecutor {
    fn kind(&self) -> StepKind {
        StepKind::Select
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
        let Some(control) = select_control(step, ctx).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::SelectNotFound));
        };

        let native = ctx.page.tag_name(control).await? == "select" && !step.options.searchable;
        let mut result = StepResult::ok(&step.id).with_value(value.clone());
        if native {
            match self.pick_native(step, ctx, control, &value).await? {
                Ok(chosen) => result = result.with_diagnostic("option", chosen),
                Err(reason) => {
                    return Ok(StepResult::failed(&step.id, reason).with_value(value));
                }
            }
        } else {
            let fallback = PickFallback {
                contains: true,
                first: step.options.fallback_first_option,
            };
            match pick_searchable(ctx, step, control, &value, fallback).await? {
                Ok(how) => result = result.with_diagnostic("match", how.as_str()),
                Err(reason) => {
                    return Ok(StepResult::failed(&step.id, reason).with_value(value));
                }
            }
        }

        if let Some(dependent) = &step.options.dependent {
            debug!(step_id = %step.id, dropdown = %dependent.name, "Waiting for dependent dropdown");
            if !self.await_dependent(ctx, control, dependent).await? {
                return Ok(StepResult::failed(
                    &step.id,
                    ReasonCode::DropdownNotPopulated(dependent.name.clone()),
                )
                .with_value(value));
            }
            result = result.with_diagnostic("dependent", dependent.name.clone());
        }
        Ok(result)
    }
}
