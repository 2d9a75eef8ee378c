use std::fmt;

use async_trait::async_trait;
use formflow_core_types::RemoteFile;

use crate::{errors::PageError, events::DomEvent};

/// Opaque handle to an element of the hosted page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Access to the hosted page's element tree.
///
/// The tree is the single shared mutable resource of a run. Implementations
/// make no promise that a write "took": callers re-read state after every
/// action.
#[async_trait]
pub trait PagePort: Send + Sync {
    /// First element matching `selector`, in document order, under `scope`
    /// (or the whole document).
    async fn query_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, PageError>;

    async fn query_selector_all(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, PageError>;

    /// Lower-case tag name.
    async fn tag_name(&self, node: NodeId) -> Result<String, PageError>;

    /// Rendered text of the element and its descendants.
    async fn text_content(&self, node: NodeId) -> Result<String, PageError>;

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, PageError>;

    async fn set_attribute(&self, node: NodeId, name: &str, value: &str)
        -> Result<(), PageError>;

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, PageError>;

    /// Nearest inclusive ancestor matching `selector`.
    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, PageError>;

    async fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError>;

    async fn is_visible(&self, node: NodeId) -> Result<bool, PageError>;

    async fn is_disabled(&self, node: NodeId) -> Result<bool, PageError>;

    async fn is_checked(&self, node: NodeId) -> Result<bool, PageError>;

    /// Plain `checked` assignment; fires no events.
    async fn set_checked_property(&self, node: NodeId, checked: bool) -> Result<(), PageError>;

    async fn value(&self, node: NodeId) -> Result<String, PageError>;

    /// Plain `.value` assignment. Framework-managed inputs may silently
    /// discard it.
    async fn set_value_property(&self, node: NodeId, value: &str) -> Result<(), PageError>;

    /// Assign through the platform's own value setter, bypassing any
    /// framework shadow copy of the field value.
    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), PageError>;

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), PageError>;

    async fn focus(&self, node: NodeId) -> Result<(), PageError>;

    async fn blur(&self, node: NodeId) -> Result<(), PageError>;

    /// Dispatch a synthetic, bubbling event at the element.
    async fn dispatch_event(&self, node: NodeId, event: DomEvent) -> Result<(), PageError>;

    /// Programmatic `element.click()`.
    async fn native_click(&self, node: NodeId) -> Result<(), PageError>;

    /// Rebuild native file objects from bytes and put them on an upload input.
    async fn attach_files(&self, input: NodeId, files: &[RemoteFile]) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Visible text of the whole document.
    async fn body_text(&self) -> Result<String, PageError>;

    /// Full HTML of the current document.
    async fn snapshot_html(&self) -> Result<String, PageError>;
}
