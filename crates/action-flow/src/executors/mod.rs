//! Built-in step executors and the helpers they share.

mod button;
mod checkbox;
mod checkbox_multi;
mod fields;
mod radio;
mod records;
mod sections;
mod select;
mod text_input;
mod upload;

use std::sync::Arc;

use action_locator::{normalize_text, texts_match};
use action_primitives::{wait_for, ActionError};
use formflow_core_types::{Payload, ReasonCode, Step, StepResult};
use formflow_page_port::NodeId;
use tracing::{debug, warn};

use crate::context::ExecCtx;
use crate::registry::StepExecutor;

pub use button::ButtonExecutor;
pub use checkbox::CheckboxExecutor;
pub use checkbox_multi::{CheckboxMultiExecutor, MultiSelectExecutor};
pub use radio::RadioExecutor;
pub use records::RecordGroupExecutor;
pub use sections::{SectionExecutor, SectionKind};
pub use select::SelectExecutor;
pub use text_input::TextInputExecutor;

pub(crate) const CHECKBOX_SELECTOR: &str = "input[type=\"checkbox\"]";
pub(crate) const RADIO_SELECTOR: &str = "input[type=\"radio\"]";
pub(crate) const TEXT_CONTROL_SELECTOR: &str = "input, textarea";
const ADD_CONTROL: &str = "button, a, [role=\"button\"], input[type=\"button\"]";

pub fn default_executors() -> Vec<Arc<dyn StepExecutor>> {
    let mut executors: Vec<Arc<dyn StepExecutor>> = vec![
        Arc::new(CheckboxExecutor),
        Arc::new(RadioExecutor),
        Arc::new(TextInputExecutor),
        Arc::new(ButtonExecutor),
        Arc::new(SelectExecutor),
        Arc::new(CheckboxMultiExecutor),
        Arc::new(MultiSelectExecutor),
        Arc::new(RecordGroupExecutor),
    ];
    for kind in SectionKind::ALL {
        executors.push(Arc::new(SectionExecutor::new(kind)));
    }
    executors
}

/// The step's payload value as text, `None` when absent or empty.
pub(crate) fn step_value(step: &Step, payload: &Payload) -> Option<String> {
    step.data_key.as_deref().and_then(|key| payload.text(key))
}

/// Result for a step whose payload value is absent: nothing to fill.
/// `required` is advisory and only raises the log level.
pub(crate) fn missing_value(step: &Step) -> StepResult {
    if step.required {
        warn!(step_id = %step.id, step_type = %step.kind, "Required step has no payload value");
    } else {
        debug!(step_id = %step.id, "No payload value, nothing to fill");
    }
    StepResult::ok(&step.id).with_diagnostic("empty", true)
}

/// Container named by the step's `section`, if any. An unknown section
/// widens the search to the whole page.
pub(crate) async fn section_scope(ctx: &ExecCtx, step: &Step) -> Result<Option<NodeId>, ActionError> {
    let Some(title) = step.locator.section.as_deref() else {
        return Ok(None);
    };
    let section = ctx.locator.find_section(title).await?;
    if section.is_none() {
        warn!(step_id = %step.id, section = title, "Section not found, using whole page");
    }
    Ok(section)
}

/// Control whose visible text is `text` ("add record", "add document").
pub(crate) async fn find_add_control(
    ctx: &ExecCtx,
    scope: Option<NodeId>,
    text: &str,
) -> Result<Option<NodeId>, ActionError> {
    if let Some(node) = ctx.locator.find_by_text_among(scope, text, ADD_CONTROL).await? {
        return Ok(Some(node));
    }
    match ctx.locator.find_by_text(scope, text).await? {
        Some(found) => Ok(ctx.locator.actionable_ancestor(found).await?),
        None => Ok(None),
    }
}

/// Label element describing a checkbox or radio input.
pub(crate) async fn label_of(ctx: &ExecCtx, input: NodeId) -> Result<Option<NodeId>, ActionError> {
    if let Some(id) = ctx.page.attribute(input, "id").await? {
        if !id.is_empty() {
            let selector = format!("label[for=\"{}\"]", id.replace('"', "\\\""));
            if let Some(label) = ctx.page.query_selector(None, &selector).await? {
                return Ok(Some(label));
            }
        }
    }
    Ok(ctx.page.closest(input, "label").await?)
}

/// Visible option text of a checkbox or radio: its label, else its parent.
pub(crate) async fn choice_text(ctx: &ExecCtx, input: NodeId) -> Result<String, ActionError> {
    if let Some(label) = label_of(ctx, input).await? {
        return Ok(ctx.page.text_content(label).await?);
    }
    match ctx.page.parent(input).await? {
        Some(parent) => Ok(ctx.page.text_content(parent).await?),
        None => Ok(String::new()),
    }
}

/// First input among `inputs` whose value equals `wanted`, else whose
/// option text matches it. Exact text beats containment.
pub(crate) async fn match_choice(
    ctx: &ExecCtx,
    inputs: &[NodeId],
    wanted: &str,
) -> Result<Option<NodeId>, ActionError> {
    for input in inputs {
        if ctx.page.attribute(*input, "value").await?.as_deref() == Some(wanted) {
            return Ok(Some(*input));
        }
    }
    let wanted_norm = normalize_text(wanted);
    let mut partial = None;
    for input in inputs {
        let text = choice_text(ctx, *input).await?;
        if normalize_text(&text) == wanted_norm {
            return Ok(Some(*input));
        }
        if partial.is_none() && texts_match(&text, wanted) {
            partial = Some(*input);
        }
    }
    Ok(partial)
}

/// Click each target in turn until `input` reports `want`. Returns the name
/// of the attempt that worked.
pub(crate) async fn click_until_checked(
    ctx: &ExecCtx,
    input: NodeId,
    want: bool,
    attempts: &[(&'static str, NodeId)],
) -> Result<Option<&'static str>, ActionError> {
    for (name, target) in attempts {
        match ctx.primitives.click(*target).await {
            Ok(_) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                debug!(attempt = name, error = %err, "Click attempt failed");
                continue;
            }
        }
        ctx.settle().await;
        if ctx.page.is_checked(input).await? == want {
            return Ok(Some(name));
        }
        debug!(attempt = name, "Click did not change the checked state");
    }
    Ok(None)
}

/// How a dropdown option was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OptionMatch {
    Exact,
    Contains,
    First,
}

impl OptionMatch {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            OptionMatch::Exact => "exact",
            OptionMatch::Contains => "contains",
            OptionMatch::First => "first",
        }
    }
}

/// Visible rendered options of the open dropdown.
async fn visible_options(ctx: &ExecCtx) -> Result<Vec<(NodeId, String)>, ActionError> {
    let mut options = Vec::new();
    for node in ctx
        .page
        .query_selector_all(None, &ctx.profile.option_selector)
        .await?
    {
        if ctx.page.is_visible(node).await? {
            options.push((node, ctx.page.text_content(node).await?));
        }
    }
    Ok(options)
}

/// Which fallbacks a dropdown pick may use after an exact text match fails.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PickFallback {
    pub contains: bool,
    pub first: bool,
}

/// Drive a searchable dropdown: open it, type `value` so the page filters
/// its own list, then click the best rendered option.
pub(crate) async fn pick_searchable(
    ctx: &ExecCtx,
    step: &Step,
    input: NodeId,
    value: &str,
    fallback: PickFallback,
) -> Result<Result<OptionMatch, ReasonCode>, ActionError> {
    if let Err(err) = ctx.primitives.click(input).await {
        if err.is_fatal() {
            return Err(err);
        }
        debug!(step_id = %step.id, error = %err, "Opening click failed, typing anyway");
    }
    ctx.settle().await;
    ctx.primitives
        .type_into(input, value, ctx.typing(step))
        .await?;

    let options = match wait_for("dropdown options", ctx.timings.option_wait(step), move || async move {
        let options = visible_options(ctx).await?;
        Ok::<_, ActionError>((!options.is_empty()).then_some(options))
    })
    .await
    {
        Ok(options) => options,
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => return Ok(Err(ReasonCode::DropdownNotOpened)),
    };

    let wanted = normalize_text(value);
    let chosen = options
        .iter()
        .find(|(_, text)| normalize_text(text) == wanted)
        .map(|(node, _)| (*node, OptionMatch::Exact))
        .or_else(|| {
            options
                .iter()
                .filter(|_| fallback.contains)
                .find(|(_, text)| texts_match(text, value))
                .map(|(node, _)| (*node, OptionMatch::Contains))
        })
        .or_else(|| {
            options
                .first()
                .filter(|_| fallback.first)
                .map(|(node, _)| (*node, OptionMatch::First))
        });

    let Some((option, how)) = chosen else {
        return Ok(Err(ReasonCode::OptionNotFoundAfterTyping));
    };
    if how == OptionMatch::First {
        warn!(step_id = %step.id, value, "No option matched, taking the first one");
    }
    match ctx.primitives.click(option).await {
        Ok(_) => {}
        Err(err) if err.is_fatal() => return Err(err),
        Err(_) => return Ok(Err(ReasonCode::OptionClickFailed)),
    }
    ctx.settle().await;
    Ok(Ok(how))
}
