use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use formflow_core_types::RemoteFile;
use formflow_page_port::{DomEvent, NodeId, PageError, PagePort};
use serde_json::{json, Value};
use tracing::trace;

use crate::script;
use crate::transport::{CdpTransport, CommandTarget};

/// One attached Chromium tab, driven through `Runtime.evaluate`.
#[derive(Clone)]
pub struct CdpPage {
    transport: Arc<dyn CdpTransport>,
    session: String,
}

impl CdpPage {
    pub fn new(transport: Arc<dyn CdpTransport>, session: impl Into<String>) -> Self {
        Self {
            transport,
            session: session.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session
    }

    /// Evaluate an expression in the page and return its by-value result.
    pub async fn evaluate(&self, expression: String) -> Result<Value, PageError> {
        let response = self
            .transport
            .send_command(
                CommandTarget::Session(self.session.clone()),
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            let message = details
                .get("exception")
                .and_then(|exception| exception.get("description"))
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("evaluation threw");
            return Err(PageError::Script(message.to_string()));
        }

        Ok(response
            .get("result")
            .and_then(|result| result.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn call(&self, op: &str, args: Value) -> Result<Value, PageError> {
        trace!(session = %self.session, op, "page call");
        let reply = self.evaluate(script::invocation(op, &args)).await?;
        script::unwrap_reply(reply)
    }

    async fn call_node(&self, op: &str, args: Value) -> Result<Option<NodeId>, PageError> {
        Ok(self.call(op, args).await?.as_u64().map(NodeId))
    }

    async fn call_bool(&self, op: &str, node: NodeId) -> Result<bool, PageError> {
        Ok(self
            .call(op, json!({ "node": node.0 }))
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn call_string(&self, op: &str, args: Value) -> Result<String, PageError> {
        match self.call(op, args).await? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Err(PageError::Script(format!("{op} returned {other}"))),
        }
    }
}

#[async_trait]
impl PagePort for CdpPage {
    async fn query_selector(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Option<NodeId>, PageError> {
        let found = self
            .call(
                "query",
                json!({ "scope": scope.map(|n| n.0), "selector": selector, "all": false }),
            )
            .await?;
        Ok(node_list(&found).into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<NodeId>,
        selector: &str,
    ) -> Result<Vec<NodeId>, PageError> {
        let found = self
            .call(
                "query",
                json!({ "scope": scope.map(|n| n.0), "selector": selector, "all": true }),
            )
            .await?;
        Ok(node_list(&found))
    }

    async fn tag_name(&self, node: NodeId) -> Result<String, PageError> {
        self.call_string("tag", json!({ "node": node.0 })).await
    }

    async fn text_content(&self, node: NodeId) -> Result<String, PageError> {
        self.call_string("text", json!({ "node": node.0 })).await
    }

    async fn attribute(&self, node: NodeId, name: &str) -> Result<Option<String>, PageError> {
        let value = self.call("attr", json!({ "node": node.0, "name": name })).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn set_attribute(
        &self,
        node: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), PageError> {
        self.call("setAttr", json!({ "node": node.0, "name": name, "value": value }))
            .await
            .map(drop)
    }

    async fn parent(&self, node: NodeId) -> Result<Option<NodeId>, PageError> {
        self.call_node("parent", json!({ "node": node.0 })).await
    }

    async fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, PageError> {
        self.call_node("closest", json!({ "node": node.0, "selector": selector }))
            .await
    }

    async fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError> {
        let matched = self
            .call("matches", json!({ "node": node.0, "selector": selector }))
            .await?;
        Ok(matched.as_bool().unwrap_or(false))
    }

    async fn is_visible(&self, node: NodeId) -> Result<bool, PageError> {
        self.call_bool("visible", node).await
    }

    async fn is_disabled(&self, node: NodeId) -> Result<bool, PageError> {
        self.call_bool("disabled", node).await
    }

    async fn is_checked(&self, node: NodeId) -> Result<bool, PageError> {
        self.call_bool("checked", node).await
    }

    async fn set_checked_property(&self, node: NodeId, checked: bool) -> Result<(), PageError> {
        self.call("setChecked", json!({ "node": node.0, "checked": checked }))
            .await
            .map(drop)
    }

    async fn value(&self, node: NodeId) -> Result<String, PageError> {
        self.call_string("value", json!({ "node": node.0 })).await
    }

    async fn set_value_property(&self, node: NodeId, value: &str) -> Result<(), PageError> {
        self.call("setValue", json!({ "node": node.0, "value": value }))
            .await
            .map(drop)
    }

    async fn set_native_value(&self, node: NodeId, value: &str) -> Result<(), PageError> {
        self.call("setNativeValue", json!({ "node": node.0, "value": value }))
            .await
            .map(drop)
    }

    async fn scroll_into_view(&self, node: NodeId) -> Result<(), PageError> {
        self.call("scroll", json!({ "node": node.0 })).await.map(drop)
    }

    async fn focus(&self, node: NodeId) -> Result<(), PageError> {
        self.call("focus", json!({ "node": node.0 })).await.map(drop)
    }

    async fn blur(&self, node: NodeId) -> Result<(), PageError> {
        self.call("blur", json!({ "node": node.0 })).await.map(drop)
    }

    async fn dispatch_event(&self, node: NodeId, event: DomEvent) -> Result<(), PageError> {
        self.call(
            "dispatch",
            json!({
                "node": node.0,
                "type": event.name(),
                "interface": event.interface(),
                "key": event.key(),
            }),
        )
        .await
        .map(drop)
    }

    async fn native_click(&self, node: NodeId) -> Result<(), PageError> {
        self.call("click", json!({ "node": node.0 })).await.map(drop)
    }

    async fn attach_files(&self, input: NodeId, files: &[RemoteFile]) -> Result<(), PageError> {
        let files: Vec<Value> = files
            .iter()
            .map(|file| {
                json!({
                    "name": file.name,
                    "type": file.mime_type,
                    "data": STANDARD.encode(&file.bytes),
                })
            })
            .collect();
        self.call("attachFiles", json!({ "node": input.0, "files": files }))
            .await
            .map(drop)
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.call_string("url", json!({})).await
    }

    async fn body_text(&self) -> Result<String, PageError> {
        self.call_string("bodyText", json!({})).await
    }

    async fn snapshot_html(&self) -> Result<String, PageError> {
        self.call_string("html", json!({})).await
    }
}

fn node_list(value: &Value) -> Vec<NodeId> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_u64).map(NodeId).collect())
        .unwrap_or_default()
}
