//! Direct assignment primitives

use formflow_page_port::{DomEvent, NodeId, PagePort};
use tracing::debug;

use crate::errors::ActionError;

/// Assign through the platform setter so a UI framework's cached copy of the
/// value cannot swallow the write, then notify input, change and blur.
pub async fn execute_set_value(
    page: &dyn PagePort,
    node: NodeId,
    value: &str,
) -> Result<(), ActionError> {
    debug!(%node, "Executing framework-safe value assignment");
    page.set_native_value(node, value).await?;
    page.dispatch_event(node, DomEvent::Input).await?;
    page.dispatch_event(node, DomEvent::Change).await?;
    page.dispatch_event(node, DomEvent::Blur).await?;
    Ok(())
}

/// Set `checked` and fire the notifications a user toggle would.
pub async fn execute_assign_checked(
    page: &dyn PagePort,
    node: NodeId,
    checked: bool,
) -> Result<(), ActionError> {
    debug!(%node, checked, "Assigning checked state");
    page.set_checked_property(node, checked).await?;
    page.dispatch_event(node, DomEvent::Input).await?;
    page.dispatch_event(node, DomEvent::Change).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_page_port::memory::MemoryPage;

    #[tokio::test]
    async fn framework_safe_write_reaches_managed_inputs() {
        let page = MemoryPage::from_html(r#"<input id="i" data-managed>"#);
        let input = page.find("#i").unwrap();

        page.set_value_property(input, "lost").await.unwrap();
        assert_eq!(page.value(input).await.unwrap(), "");

        execute_set_value(&page, input, "kept").await.unwrap();
        assert_eq!(page.value(input).await.unwrap(), "kept");
        assert_eq!(
            page.read(|tree| tree.events_at(input)),
            vec![DomEvent::Input, DomEvent::Change, DomEvent::Blur]
        );
    }
}
