use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::page::CdpPage;
use crate::script;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget};

const READY_POLL: Duration = Duration::from_millis(100);

/// A Chromium instance that hands out one attached tab per form run.
#[derive(Clone)]
pub struct CdpBrowser {
    transport: Arc<dyn CdpTransport>,
    config: CdpConfig,
}

impl CdpBrowser {
    /// Launch Chromium (or attach to `websocket_url`).
    pub async fn launch(config: CdpConfig) -> Result<Self, AdapterError> {
        let transport = ChromiumTransport::new(config.clone());
        transport.connect().await?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn CdpTransport>, config: CdpConfig) -> Self {
        Self { transport, config }
    }

    /// New tab at `url`, returned once the document finished loading.
    pub async fn open_page(&self, url: &str) -> Result<CdpPage, AdapterError> {
        let created = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": "about:blank" }),
            )
            .await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = self
            .transport
            .send_command(
                CommandTarget::Browser,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session = string_field(&attached, "sessionId")?;
        let target = CommandTarget::Session(session.clone());

        self.transport
            .send_command(target.clone(), "Page.enable", json!({}))
            .await?;
        self.transport
            .send_command(target.clone(), "Runtime.enable", json!({}))
            .await?;

        let navigated = self
            .transport
            .send_command(target, "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = navigated
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
        {
            return Err(AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(format!("{url}: {error}")));
        }

        let page = CdpPage::new(self.transport.clone(), session);
        self.wait_until_loaded(&page).await?;
        info!(url, session = page.session_id(), "Page opened");
        Ok(page)
    }

    async fn wait_until_loaded(&self, page: &CdpPage) -> Result<(), AdapterError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.load_timeout_ms);
        loop {
            let state = page
                .evaluate(script::invocation("readyState", &json!({})))
                .await
                .ok()
                .and_then(|reply| script::unwrap_reply(reply).ok());
            match state.as_ref().and_then(Value::as_str) {
                Some("complete") => return Ok(()),
                other => debug!(state = ?other, "Waiting for document"),
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::new(AdapterErrorKind::Timeout)
                    .with_hint("document did not finish loading")
                    .retriable(true));
            }
            sleep(READY_POLL).await;
        }
    }

    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("response missing {field}"))
                .with_data(value.clone())
        })
}
