use action_primitives::ActionError;
use async_trait::async_trait;
use formflow_core_types::{value_as_text, Payload, ReasonCode, Step, StepKind, StepResult};
use formflow_page_port::NodeId;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    label_of, match_choice, pick_searchable, section_scope, select::select_control, PickFallback,
    CHECKBOX_SELECTOR,
};
use crate::context::ExecCtx;
use crate::registry::StepExecutor;

fn wanted_values(step: &Step, payload: &Payload) -> Vec<String> {
    step.data_key
        .as_deref()
        .map(|key| payload.list(key))
        .unwrap_or_default()
        .iter()
        .filter_map(value_as_text)
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// Fold per-item outcomes into the step result.
fn summarize(step: &Step, outcomes: Map<String, Value>, succeeded: usize, found: usize) -> StepResult {
    let total = outcomes.len();
    let already = total > 0 && outcomes.values().all(|outcome| outcome == "already");
    let result = if already {
        StepResult::ok(&step.id).with_diagnostic("already", true)
    } else if succeeded > 0 {
        StepResult::ok(&step.id)
    } else if found == 0 {
        StepResult::failed(&step.id, ReasonCode::CheckboxNotFound)
    } else {
        StepResult::failed(&step.id, ReasonCode::NoMethodSucceeded)
    };
    result
        .with_diagnostic("items", Value::Object(outcomes))
        .with_diagnostic("succeeded", succeeded)
        .with_diagnostic("total", total)
}

/// A group of checkboxes; every payload value ticks one of them.
pub struct CheckboxMultiExecutor;

impl CheckboxMultiExecutor {
    async fn group(&self, step: &Step, ctx: &ExecCtx) -> Result<Option<NodeId>, ActionError> {
        let scope = section_scope(ctx, step).await?;
        if let Some(selector) = step.locator.selector.as_deref() {
            if let Some(node) = ctx.locator.find_by_selector(scope, selector).await? {
                return Ok(Some(node));
            }
        }
        match step.locator.label.as_deref() {
            Some(label) => Ok(ctx.locator.container_from_label(scope, label).await?),
            None => Ok(scope),
        }
    }

    /// Ordered attempts for one checkbox: custom indicator, its wrapper, the
    /// label, space on the label, space on the input, then direct assignment.
    async fn tick(&self, ctx: &ExecCtx, input: NodeId) -> Result<Option<&'static str>, ActionError> {
        let label = label_of(ctx, input).await?;
        let wrapper = ctx
            .page
            .closest(input, &ctx.profile.checkbox_wrapper_selector)
            .await?;
        let indicator_scope = wrapper.or(label);
        let indicator = match indicator_scope {
            Some(scope) => {
                ctx.page
                    .query_selector(Some(scope), &ctx.profile.checkbox_indicator_selector)
                    .await?
            }
            None => None,
        };

        let mut clicks = Vec::new();
        if let Some(indicator) = indicator {
            clicks.push(("indicator", indicator));
        }
        if let Some(wrapper) = wrapper {
            clicks.push(("wrapper", wrapper));
        }
        if let Some(label) = label {
            clicks.push(("label", label));
        }
        if let Some(method) = super::click_until_checked(ctx, input, true, &clicks).await? {
            return Ok(Some(method));
        }

        let mut keys = Vec::new();
        if let Some(label) = label {
            keys.push(("label_space", label));
        }
        keys.push(("input_space", input));
        for (name, target) in keys {
            match ctx.primitives.press_space(target).await {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!(attempt = name, error = %err, "Space press failed");
                    continue;
                }
            }
            ctx.settle().await;
            if ctx.page.is_checked(input).await? {
                return Ok(Some(name));
            }
        }

        ctx.primitives.assign_checked(input, true).await?;
        if ctx.page.is_checked(input).await? {
            return Ok(Some("assign"));
        }
        Ok(None)
    }
}

#[async_trait]
impl StepExecutor for CheckboxMultiExecutor {
    fn kind(&self) -> StepKind {
        StepKind::CheckboxMulti
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let wanted = wanted_values(step, payload);
        if wanted.is_empty() {
            return Ok(super::missing_value(step));
        }
        let Some(group) = self.group(step, ctx).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::ContainerNotFound));
        };
        let boxes = ctx.page.query_selector_all(Some(group), CHECKBOX_SELECTOR).await?;

        let mut outcomes = Map::new();
        let (mut succeeded, mut found) = (0, 0);
        for value in &wanted {
            let Some(input) = match_choice(ctx, &boxes, value).await? else {
                outcomes.insert(value.clone(), Value::from("not_found"));
                continue;
            };
            found += 1;
            if ctx.page.is_checked(input).await? {
                outcomes.insert(value.clone(), Value::from("already"));
                succeeded += 1;
                continue;
            }
            match self.tick(ctx, input).await? {
                Some(method) => {
                    outcomes.insert(value.clone(), Value::from(method));
                    succeeded += 1;
                }
                None => {
                    outcomes.insert(value.clone(), Value::from("failed"));
                }
            }
        }
        Ok(summarize(step, outcomes, succeeded, found))
    }
}

/// Searchable dropdown that accepts several values, one pick per value.
pub struct MultiSelectExecutor;

#[async_trait]
impl StepExecutor for MultiSelectExecutor {
    fn kind(&self) -> StepKind {
        StepKind::MultiSelect
    }

    async fn execute(
        &self,
        step: &Step,
        payload: &Payload,
        ctx: &ExecCtx,
    ) -> Result<StepResult, ActionError> {
        let wanted = wanted_values(step, payload);
        if wanted.is_empty() {
            return Ok(super::missing_value(step));
        }
        let Some(control) = select_control(step, ctx).await? else {
            return Ok(StepResult::failed(&step.id, ReasonCode::SelectNotFound));
        };

        let mut outcomes = Map::new();
        let mut succeeded = 0;
        let mut last_reason = ReasonCode::OptionNotFoundAfterTyping;
        for value in &wanted {
            let fallback = PickFallback {
                contains: true,
                first: false,
            };
            match pick_searchable(ctx, step, control, value, fallback).await? {
                Ok(how) => {
                    outcomes.insert(value.clone(), Value::from(how.as_str()));
                    succeeded += 1;
                }
                Err(reason) => {
                    outcomes.insert(value.clone(), Value::from(reason.as_str()));
                    last_reason = reason;
                }
            }
        }

        let total = outcomes.len();
        let result = if succeeded > 0 {
            StepResult::ok(&step.id)
        } else {
            StepResult::failed(&step.id, last_reason)
        };
        Ok(result
            .with_diagnostic("items", Value::Object(outcomes))
            .with_diagnostic("succeeded", succeeded)
            .with_diagnostic("total", total))
    }
}
