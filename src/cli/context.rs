use std::path::{Path, PathBuf};
use std::sync::Arc;

use action_flow::{FlowCatalog, FlowService, Operator, PageFactory};
use anyhow::{Context, Result};
use extensions_bridge::{HttpRelayHost, RelayBridge};
use formflow_core_types::ProgressEvent;
use formflow_event_bus::{EventBus, ProgressReporter};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::config::Config;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Bundled flows plus the definition files named in the config.
    pub fn catalog(&self) -> Result<FlowCatalog> {
        let mut catalog = FlowCatalog::bundled().context("Bundled flow failed to load")?;
        for path in &self.config.flows {
            catalog
                .load_file(path)
                .with_context(|| format!("Failed to load flow {}", path.display()))?;
        }
        Ok(catalog)
    }

    /// Flow service wired to Chromium pages, the HTTP relay host and a
    /// progress log.
    pub fn flow_service(
        &self,
        pages: Arc<dyn PageFactory>,
        operator: Arc<dyn Operator>,
    ) -> Result<FlowService> {
        let config = self.config();
        let bridge_config = config.bridge_config();
        if bridge_config.api_base_url.is_none() {
            warn!("relay.api_base_url not set; confirmed submissions must be recorded manually");
        }
        let host = Arc::new(HttpRelayHost::new(bridge_config.api_base_url.clone()));
        let (bridge, _host_task) = RelayBridge::spawn(host, &bridge_config);

        Ok(FlowService::new(self.catalog()?, pages)
            .with_operator(operator)
            .with_reporter(progress_log())
            .with_profile(config.profile.clone())
            .with_timings(config.engine.clone())
            .with_watchdog(config.watchdog.polling.clone())
            .with_bridge(bridge, bridge_config))
    }
}

/// Reporter whose events are written to the log.
fn progress_log() -> ProgressReporter {
    let (reporter, bus) = ProgressReporter::in_memory(64);
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_progress(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
    reporter
}

fn log_progress(event: &ProgressEvent) {
    if event.requires_manual_action {
        warn!(
            stage = ?event.stage,
            step_id = event.step_id.as_deref().unwrap_or(""),
            "{}",
            event.message
        );
    } else {
        info!(
            stage = ?event.stage,
            step_id = event.step_id.as_deref().unwrap_or(""),
            success = event.success,
            "{}",
            event.message
        );
    }
}
