//! Click primitive - pointer sequence with programmatic fallback

use formflow_page_port::{DomEvent, NodeId, PagePort, PageError};
use tracing::{debug, warn};

use crate::{errors::ActionError, types::ClickMethod};

const POINTER_SEQUENCE: [DomEvent; 5] = [
    DomEvent::PointerDown,
    DomEvent::MouseDown,
    DomEvent::PointerUp,
    DomEvent::MouseUp,
    DomEvent::Click,
];

/// Execute click primitive
///
/// Steps:
/// 1. Scroll the element to the center of the viewport
/// 2. Attempt focus; elements that refuse focus are still clicked
/// 3. Dispatch pointerdown, mousedown, pointerup, mouseup, click
/// 4. If dispatch throws, fall back to a programmatic click
pub async fn execute_click(page: &dyn PagePort, node: NodeId) -> Result<ClickMethod, ActionError> {
    debug!(%node, "Executing click primitive");

    tolerate(page.scroll_into_view(node).await, "scroll")?;
    tolerate(page.focus(node).await, "focus")?;

    match dispatch_sequence(page, node).await {
        Ok(()) => Ok(ClickMethod::Dispatched),
        Err(err) if err.is_fatal() || matches!(err, PageError::Detached(_)) => Err(err.into()),
        Err(err) => {
            warn!(%node, error = %err, "Event dispatch failed, using programmatic click");
            page.native_click(node).await?;
            Ok(ClickMethod::Native)
        }
    }
}

async fn dispatch_sequence(page: &dyn PagePort, node: NodeId) -> Result<(), PageError> {
    for event in POINTER_SEQUENCE {
        page.dispatch_event(node, event).await?;
    }
    Ok(())
}

/// Swallow non-fatal failures of preparatory steps.
pub(crate) fn tolerate(result: Result<(), PageError>, step: &str) -> Result<(), ActionError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() || matches!(err, PageError::Detached(_)) => Err(err.into()),
        Err(err) => {
            debug!(step, error = %err, "Ignoring preparatory failure");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_page_port::memory::MemoryPage;

    #[tokio::test]
    async fn dispatches_full_pointer_sequence() {
        let page = MemoryPage::from_html(r#"<button id="b">Go</button>"#);
        let button = page.find("#b").unwrap();

        let method = execute_click(&page, button).await.unwrap();
        assert_eq!(method, ClickMethod::Dispatched);

        let names: Vec<&str> = page
            .read(|tree| tree.events_at(button))
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            vec!["focus", "pointerdown", "mousedown", "pointerup", "mouseup", "click"]
        );
    }

    #[tokio::test]
    async fn detached_targets_fail() {
        let page = MemoryPage::from_html(r#"<button id="b">Go</button>"#);
        let button = page.find("#b").unwrap();
        page.mutate(|tree| tree.remove(button));
        assert!(execute_click(&page, button).await.is_err());
    }
}
