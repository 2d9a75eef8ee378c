//! Type primitive - per-character entry for reactive inputs

use formflow_page_port::{DomEvent, NodeId, PagePort};
use tokio::time::sleep;
use tracing::debug;

use super::click::tolerate;
use crate::{errors::ActionError, types::TypingOptions};

/// Execute type primitive
///
/// Hosted UIs that only recompute on discrete input events ignore a bulk
/// value assignment, so the value grows one character at a time through the
/// platform setter with an `input` event after each.
pub async fn execute_type_into(
    page: &dyn PagePort,
    node: NodeId,
    value: &str,
    options: TypingOptions,
) -> Result<(), ActionError> {
    debug!(%node, chars = value.chars().count(), "Executing type primitive");

    tolerate(page.focus(node).await, "focus")?;
    page.set_native_value(node, "").await?;
    page.dispatch_event(node, DomEvent::Input).await?;

    let mut typed = String::with_capacity(value.len());
    for ch in value.chars() {
        typed.push(ch);
        page.set_native_value(node, &typed).await?;
        page.dispatch_event(node, DomEvent::Input).await?;
        if !options.per_char_delay.is_zero() {
            sleep(options.per_char_delay).await;
        }
    }

    page.dispatch_event(node, DomEvent::Change).await?;
    Ok(())
}
