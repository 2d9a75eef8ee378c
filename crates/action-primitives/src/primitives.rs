//! Action primitives implementation
//!
//! Element-level interactions against the hosted page:
//! 1. click - pointer sequence with programmatic fallback
//! 2. type_into - per-character entry for reactive inputs
//! 3. set_value_framework_safe - platform setter bypass for managed inputs
//! 4. keyboard - space activation and defocus
//! 5. assign_checked - last-resort state assignment with notifications

mod click;
mod keyboard;
mod set_value;
mod type_text;

use std::sync::Arc;

use async_trait::async_trait;
use formflow_page_port::{NodeId, PagePort};

use crate::{
    errors::ActionError,
    types::{ClickMethod, TypingOptions},
};

/// Action primitives trait
///
/// None of these confirm that the page accepted the interaction. Callers
/// re-read state afterwards.
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Scroll, focus, then a realistic pointer/mouse sequence and click.
    async fn click(&self, node: NodeId) -> Result<ClickMethod, ActionError>;

    /// Focus, clear, append one character at a time with an input
    /// notification per character and a change notification at the end.
    async fn type_into(
        &self,
        node: NodeId,
        value: &str,
        options: TypingOptions,
    ) -> Result<(), ActionError>;

    /// Platform value setter followed by input, change and blur notifications.
    async fn set_value_framework_safe(&self, node: NodeId, value: &str)
        -> Result<(), ActionError>;

    /// Keyboard space press on a focused element.
    async fn press_space(&self, node: NodeId) -> Result<(), ActionError>;

    /// Assign the checked state directly and notify listeners.
    async fn assign_checked(&self, node: NodeId, checked: bool) -> Result<(), ActionError>;

    /// Blur and send Escape so open popups close.
    async fn defocus(&self, node: NodeId) -> Result<(), ActionError>;
}

/// Default implementation over a [`PagePort`].
#[derive(Clone)]
pub struct DefaultActionPrimitives {
    page: Arc<dyn PagePort>,
}

impl DefaultActionPrimitives {
    pub fn new(page: Arc<dyn PagePort>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &dyn PagePort {
        self.page.as_ref()
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn click(&self, node: NodeId) -> Result<ClickMethod, ActionError> {
        click::execute_click(self.page(), node).await
    }

    async fn type_into(
        &self,
        node: NodeId,
        value: &str,
        options: TypingOptions,
    ) -> Result<(), ActionError> {
        type_text::execute_type_into(self.page(), node, value, options).await
    }

    async fn set_value_framework_safe(
        &self,
        node: NodeId,
        value: &str,
    ) -> Result<(), ActionError> {
        set_value::execute_set_value(self.page(), node, value).await
    }

    async fn press_space(&self, node: NodeId) -> Result<(), ActionError> {
        keyboard::execute_press_space(self.page(), node).await
    }

    async fn assign_checked(&self, node: NodeId, checked: bool) -> Result<(), ActionError> {
        set_value::execute_assign_checked(self.page(), node, checked).await
    }

    async fn defocus(&self, node: NodeId) -> Result<(), ActionError> {
        keyboard::execute_defocus(self.page(), node).await
    }
}
