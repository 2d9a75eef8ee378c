//! Opens hosted form pages in Chromium for the flow service.

use std::sync::Arc;

use action_flow::{FlowError, PageFactory};
use async_trait::async_trait;
use cdp_adapter::{CdpBrowser, CdpConfig};
use formflow_page_port::PagePort;
use tokio::sync::OnceCell;
use tracing::info;

/// Launches the browser on first use and opens one tab per run.
pub struct CdpPageFactory {
    config: CdpConfig,
    browser: OnceCell<CdpBrowser>,
}

impl CdpPageFactory {
    pub fn new(config: CdpConfig) -> Self {
        Self {
            config,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> Result<&CdpBrowser, FlowError> {
        self.browser
            .get_or_try_init(|| async {
                info!(
                    headless = self.config.headless,
                    attach = self.config.websocket_url.is_some(),
                    "Starting browser"
                );
                CdpBrowser::launch(self.config.clone()).await
            })
            .await
            .map_err(|err| FlowError::PageUnavailable(err.to_string()))
    }

    pub async fn shutdown(&self) {
        if let Some(browser) = self.browser.get() {
            browser.shutdown().await;
        }
    }
}

#[async_trait]
impl PageFactory for CdpPageFactory {
    async fn open(&self, url: &str) -> Result<Arc<dyn PagePort>, FlowError> {
        let browser = self.browser().await?;
        let page = browser
            .open_page(url)
            .await
            .map_err(|err| FlowError::PageUnavailable(format!("{url}: {err}")))?;
        Ok(Arc::new(page))
    }
}
