//! Sub-field filling inside record sections and composite sections.

use action_primitives::ActionError;
use formflow_core_types::{is_truthy, value_as_text, RecordField, RecordFieldKind, Step};
use formflow_page_port::NodeId;
use serde_json::Value;
use tracing::debug;

use super::{label_of, match_choice, CHECKBOX_SELECTOR, RADIO_SELECTOR, TEXT_CONTROL_SELECTOR};
use crate::context::ExecCtx;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldOutcome {
    Filled,
    /// Payload has no value for it
    Empty,
    NotFound,
    Failed,
}

impl FieldOutcome {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            FieldOutcome::Filled => "filled",
            FieldOutcome::Empty => "empty",
            FieldOutcome::NotFound => "not_found",
            FieldOutcome::Failed => "failed",
        }
    }

    pub(crate) fn is_failure(self) -> bool {
        matches!(self, FieldOutcome::NotFound | FieldOutcome::Failed)
    }
}

fn control_selector(kind: RecordFieldKind) -> &'static str {
    match kind {
        RecordFieldKind::Text | RecordFieldKind::Date => TEXT_CONTROL_SELECTOR,
        RecordFieldKind::Radio => RADIO_SELECTOR,
        RecordFieldKind::Checkbox => CHECKBOX_SELECTOR,
    }
}

/// The field's control, or for radios the element holding the group.
async fn locate(
    ctx: &ExecCtx,
    scope: Option<NodeId>,
    field: &RecordField,
) -> Result<Option<NodeId>, ActionError> {
    let control = control_selector(field.kind);
    if let Some(selector) = field.selector.as_deref() {
        let found = ctx.page.query_selector(scope, selector).await?;
        if let (Some(node), RecordFieldKind::Radio) = (found, field.kind) {
            // A selector may point at one radio rather than the group.
            if ctx.page.matches(node, RADIO_SELECTOR).await? {
                return Ok(ctx.locator.container_of(node).await?);
            }
        }
        return Ok(found);
    }
    if let Some(label) = field.label.as_deref() {
        let Some(found) = ctx.locator.find_by_text(scope, label).await? else {
            return Ok(None);
        };
        return match field.kind {
            RecordFieldKind::Radio => Ok(ctx.locator.container_of(found).await?),
            _ => Ok(ctx.locator.control_for_label(found, control).await?),
        };
    }
    let by_key = format!(
        "[name=\"{key}\"], [data-field=\"{key}\"]",
        key = field.key.replace('"', "\\\"")
    );
    let found = ctx.page.query_selector(scope, &by_key).await?;
    match (found, field.kind) {
        (Some(node), RecordFieldKind::Radio) => Ok(ctx.locator.container_of(node).await?),
        (found, _) => Ok(found),
    }
}

async fn fill_text(
    ctx: &ExecCtx,
    step: &Step,
    input: NodeId,
    text: &str,
    date: bool,
) -> Result<bool, ActionError> {
    if date {
        ctx.primitives.click(input).await?;
        ctx.settle().await;
        ctx.primitives.type_into(input, text, ctx.typing(step)).await?;
        return Ok(!ctx.page.value(input).await?.trim().is_empty());
    }
    ctx.primitives.set_value_framework_safe(input, text).await?;
    if ctx.page.value(input).await? == text {
        return Ok(true);
    }
    ctx.primitives.type_into(input, text, ctx.typing(step)).await?;
    Ok(ctx.page.value(input).await? == text)
}

async fn fill_radio(ctx: &ExecCtx, group: NodeId, text: &str) -> Result<bool, ActionError> {
    let radios = ctx.page.query_selector_all(Some(group), RADIO_SELECTOR).await?;
    let Some(input) = match_choice(ctx, &radios, text).await? else {
        return Ok(false);
    };
    if ctx.page.is_checked(input).await? {
        return Ok(true);
    }
    let target = label_of(ctx, input).await?.unwrap_or(input);
    ctx.primitives.click(target).await?;
    ctx.settle().await;
    if !ctx.page.is_checked(input).await? {
        ctx.primitives.assign_checked(input, true).await?;
    }
    Ok(ctx.page.is_checked(input).await?)
}

async fn fill_checkbox(ctx: &ExecCtx, input: NodeId, want: bool) -> Result<bool, ActionError> {
    if ctx.page.is_checked(input).await? == want {
        return Ok(true);
    }
    let target = label_of(ctx, input).await?.unwrap_or(input);
    ctx.primitives.click(target).await?;
    ctx.settle().await;
    if ctx.page.is_checked(input).await? != want {
        ctx.primitives.assign_checked(input, want).await?;
    }
    Ok(ctx.page.is_checked(input).await? == want)
}

/// Fill one sub-field from `value`. Missing values are left alone.
pub(crate) async fn fill_field(
    ctx: &ExecCtx,
    step: &Step,
    scope: Option<NodeId>,
    field: &RecordField,
    value: Option<&Value>,
) -> Result<FieldOutcome, ActionError> {
    if matches!(value, None | Some(Value::Null)) {
        return Ok(FieldOutcome::Empty);
    }
    let text = value.and_then(value_as_text).filter(|t| !t.trim().is_empty());
    // `false` is a meaningful checkbox value; everything else needs text.
    if text.is_none() && field.kind != RecordFieldKind::Checkbox {
        return Ok(FieldOutcome::Empty);
    }
    let Some(node) = locate(ctx, scope, field).await? else {
        debug!(field = %field.key, "Sub-field not found");
        return Ok(FieldOutcome::NotFound);
    };
    let text = text.unwrap_or_default();

    let attempt = match field.kind {
        RecordFieldKind::Text => fill_text(ctx, step, node, &text, false).await,
        RecordFieldKind::Date => fill_text(ctx, step, node, &text, true).await,
        RecordFieldKind::Radio => fill_radio(ctx, node, &text).await,
        RecordFieldKind::Checkbox => fill_checkbox(ctx, node, is_truthy(value)).await,
    };
    match attempt {
        Ok(true) => Ok(FieldOutcome::Filled),
        Ok(false) => Ok(FieldOutcome::Failed),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(field = %field.key, error = %err, "Sub-field fill raised");
            Ok(FieldOutcome::Failed)
        }
    }
}
