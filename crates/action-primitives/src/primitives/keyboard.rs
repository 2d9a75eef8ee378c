//! Keyboard primitives

use formflow_page_port::{DomEvent, NodeId, PagePort};
use tracing::debug;

use super::click::tolerate;
use crate::errors::ActionError;

const SPACE: &str = " ";
const ESCAPE: &str = "Escape";

pub async fn execute_press_space(page: &dyn PagePort, node: NodeId) -> Result<(), ActionError> {
    debug!(%node, "Pressing space");
    tolerate(page.focus(node).await, "focus")?;
    page.dispatch_event(node, DomEvent::KeyDown(SPACE.to_string()))
        .await?;
    page.dispatch_event(node, DomEvent::KeyUp(SPACE.to_string()))
        .await?;
    Ok(())
}

/// Blur and press Escape so an open option list closes and the hosted page
/// commits the selection.
pub async fn execute_defocus(page: &dyn PagePort, node: NodeId) -> Result<(), ActionError> {
    debug!(%node, "Defocusing");
    page.dispatch_event(node, DomEvent::KeyDown(ESCAPE.to_string()))
        .await?;
    page.dispatch_event(node, DomEvent::KeyUp(ESCAPE.to_string()))
        .await?;
    tolerate(page.blur(node).await, "blur")?;
    Ok(())
}
